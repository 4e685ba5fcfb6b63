//! Content-hash cache for incremental builds.
//!
//! Rendering a document means a round trip through the external AsciiDoc
//! converter, which dominates build time on any real documentation tree.
//! This module lets the render stage skip documents whose bytes have not
//! changed since the output was last written.
//!
//! # Design
//!
//! The cache is split in three pieces:
//!
//! - [`HashStore`]: a durable `source path → digest` mapping persisted in the
//!   working directory between builds.
//! - [`IncrementalCache::needs_regeneration`]: the change detector for a
//!   single source/output pair.
//! - [`IncrementalCache::prune`]: drops entries for sources that are no
//!   longer part of the build.
//!
//! ## Keys and digests
//!
//! Keys are the source path as given by the caller, used verbatim. The
//! render pipeline always passes the path produced by discovery, so the
//! representation is stable across builds as long as the source directory
//! is configured the same way.
//!
//! Digests are lowercase hex SHA-256 of the file contents. Content-based
//! rather than mtime-based so they survive `git checkout`, which resets
//! modification times.
//!
//! A source needs regeneration when:
//! 1. Its output file does not exist, or
//! 2. Its digest is unavailable, unknown, or differs from the stored one, or
//! 3. It was modified after its output file.
//!
//! ## Storage
//!
//! The store is a property file named `.asciidoc.hashes` in the working
//! directory (see [`crate::properties`] for the format). A missing or
//! unreadable file starts the build from an empty store; a failed save only
//! costs a full rebuild next time.
//!
//! ## Concurrency
//!
//! None. One build pass owns the cache. Two builds sharing a working
//! directory race, and the last save wins.

use crate::properties;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Name of the hash store file within the working directory.
pub const HASH_FILENAME: &str = ".asciidoc.hashes";

const HASH_FILE_COMMENT: &str = "AsciiDoc file hashes for incremental build";

/// Persisted mapping from source path to content digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashStore {
    work_dir: PathBuf,
    entries: BTreeMap<String, String>,
}

impl HashStore {
    /// Create an empty store bound to `work_dir`.
    pub fn empty(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    /// Load from the working directory. Returns an empty store if the file
    /// doesn't exist, can't be read, or can't be parsed.
    pub fn load(work_dir: &Path) -> Self {
        let path = work_dir.join(HASH_FILENAME);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::empty(work_dir),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Failed to read hash cache, starting empty");
                return Self::empty(work_dir);
            }
        };
        let text = match String::from_utf8(bytes) {
            Ok(t) => t,
            Err(_) => {
                tracing::debug!(path = %path.display(), "Hash cache is not valid UTF-8, starting empty");
                return Self::empty(work_dir);
            }
        };
        match properties::parse(&text) {
            Ok(entries) => Self {
                work_dir: work_dir.to_path_buf(),
                entries,
            },
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Failed to parse hash cache, starting empty");
                Self::empty(work_dir)
            }
        }
    }

    /// Write the store, creating the working directory if needed.
    pub fn save(&self) -> io::Result<()> {
        fs::create_dir_all(&self.work_dir)?;
        fs::write(self.path(), properties::write(&self.entries, HASH_FILE_COMMENT))
    }

    /// Location of the store file.
    pub fn path(&self) -> PathBuf {
        self.work_dir.join(HASH_FILENAME)
    }

    pub fn get(&self, source_key: &str) -> Option<&str> {
        self.entries.get(source_key).map(String::as_str)
    }

    pub fn put(&mut self, source_key: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(source_key.into(), digest.into());
    }

    /// Delete every entry whose key is not in `current_keys`.
    pub fn remove_keys_not_in(&mut self, current_keys: &HashSet<String>) {
        self.entries.retain(|key, _| current_keys.contains(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Store key for a source path.
pub fn source_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Change detection and bookkeeping on top of a [`HashStore`].
#[derive(Debug)]
pub struct IncrementalCache {
    store: HashStore,
}

impl IncrementalCache {
    /// Open the cache for a working directory, loading any existing store.
    pub fn open(work_dir: &Path) -> Self {
        Self {
            store: HashStore::load(work_dir),
        }
    }

    /// Wrap an already-built store.
    pub fn with_store(store: HashStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &HashStore {
        &self.store
    }

    /// Digest of `source`, or `None` if it can't be read.
    pub fn current_digest(source: &Path) -> Option<String> {
        match hash_file(source) {
            Ok(digest) => Some(digest),
            Err(e) => {
                tracing::debug!(path = %source.display(), error = %e, "Unable to hash source file");
                None
            }
        }
    }

    /// Decide whether `output` must be regenerated from `source`.
    pub fn needs_regeneration(&self, source: &Path, output: &Path) -> bool {
        if !output.exists() {
            return true;
        }

        let current = Self::current_digest(source);
        let cached = self.store.get(&source_key(source));
        match (current.as_deref(), cached) {
            (Some(current), Some(cached)) if current == cached => {}
            _ => return true,
        }

        // Digest matched; an output older than its source still counts as stale.
        match (modified(source), modified(output)) {
            (Some(src), Some(out)) => src > out,
            _ => false,
        }
    }

    /// Remember the current digest of `source`. Unreadable sources leave
    /// their entry untouched.
    pub fn record_hash(&mut self, source: &Path) {
        if let Some(digest) = Self::current_digest(source) {
            self.store.put(source_key(source), digest);
        }
    }

    /// Drop entries for sources outside `current_files`. Must be given the
    /// complete file set of the pass.
    pub fn prune(&mut self, current_files: &[PathBuf]) {
        let keys: HashSet<String> = current_files.iter().map(|p| source_key(p)).collect();
        let before = self.store.len();
        self.store.remove_keys_not_in(&keys);
        let removed = before - self.store.len();
        if removed > 0 {
            tracing::debug!(removed, "Pruned stale hash cache entries");
        }
    }

    /// Persist the store. Failure is logged, never fatal.
    pub fn save(&self) {
        if let Err(e) = self.store.save() {
            tracing::warn!(path = %self.store.path().display(), error = %e, "Failed to save hash cache");
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    // =========================================================================
    // HashStore load / save
    // =========================================================================

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let store = HashStore::load(tmp.path());
        assert!(store.is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut store = HashStore::empty(tmp.path());
        store.put("/docs/a.adoc", "aa11");
        store.put("/docs/sub dir/b.adoc", "bb22");
        store.save().unwrap();

        let loaded = HashStore::load(tmp.path());
        assert_eq!(loaded, store);
        assert_eq!(loaded.get("/docs/sub dir/b.adoc"), Some("bb22"));
    }

    #[test]
    fn save_creates_work_directory() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("target/asciidoc-work");
        assert!(!work.exists());

        HashStore::empty(&work).save().unwrap();

        assert!(work.join(HASH_FILENAME).exists());
    }

    #[test]
    fn saved_file_starts_with_comment_line() {
        let tmp = TempDir::new().unwrap();
        let mut store = HashStore::empty(tmp.path());
        store.put("a.adoc", "00ff");
        store.save().unwrap();

        let text = fs::read_to_string(tmp.path().join(HASH_FILENAME)).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with('#'));
        assert_eq!(lines.next(), Some("a.adoc=00ff"));
    }

    #[test]
    fn save_overwrites_existing_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(HASH_FILENAME), "x.adoc=abc123\n").unwrap();

        let mut store = HashStore::load(tmp.path());
        store.put("x.adoc", "def456");
        store.save().unwrap();

        assert_eq!(HashStore::load(tmp.path()).get("x.adoc"), Some("def456"));
    }

    #[test]
    fn load_garbage_bytes_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(HASH_FILENAME), [0xff, 0xfe, 0x00, 0x9c, 0x80]).unwrap();
        assert!(HashStore::load(tmp.path()).is_empty());
    }

    #[test]
    fn load_malformed_escape_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(HASH_FILENAME), "a=1\nb=\\uXYZ\n").unwrap();
        assert!(HashStore::load(tmp.path()).is_empty());
    }

    #[test]
    fn save_into_unwritable_location_reports_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();

        let store = HashStore::empty(&blocker.join("work"));
        assert!(store.save().is_err());
        // The cache-level save only logs.
        IncrementalCache::with_store(store).save();
    }

    // =========================================================================
    // Change detection
    // =========================================================================

    #[test]
    fn missing_output_needs_regeneration() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        fs::write(&source, "= A").unwrap();

        let mut cache = IncrementalCache::open(tmp.path());
        cache.record_hash(&source);

        assert!(cache.needs_regeneration(&source, &tmp.path().join("a.html")));
    }

    #[test]
    fn source_not_in_cache_needs_regeneration() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        let output = tmp.path().join("a.html");
        fs::write(&source, "= A").unwrap();
        fs::write(&output, "<h1>A</h1>").unwrap();

        let cache = IncrementalCache::open(tmp.path());
        assert!(cache.needs_regeneration(&source, &output));
    }

    #[test]
    fn unchanged_source_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        let output = tmp.path().join("a.html");
        fs::write(&source, "= A").unwrap();

        let mut cache = IncrementalCache::open(tmp.path());
        cache.record_hash(&source);
        fs::write(&output, "<h1>A</h1>").unwrap();

        assert!(!cache.needs_regeneration(&source, &output));
    }

    #[test]
    fn changed_source_needs_regeneration() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        let output = tmp.path().join("a.html");
        fs::write(&source, "X").unwrap();

        let mut cache = IncrementalCache::open(tmp.path());
        assert!(cache.needs_regeneration(&source, &output));

        cache.record_hash(&source);
        fs::write(&output, "rendered").unwrap();
        assert!(!cache.needs_regeneration(&source, &output));

        fs::write(&source, "Y").unwrap();
        assert!(cache.needs_regeneration(&source, &output));
    }

    #[test]
    fn source_newer_than_output_needs_regeneration() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        let output = tmp.path().join("a.html");
        fs::write(&source, "= A").unwrap();
        fs::write(&output, "<h1>A</h1>").unwrap();

        let mut cache = IncrementalCache::open(tmp.path());
        cache.record_hash(&source);

        let now = SystemTime::now();
        set_mtime(&output, now - Duration::from_secs(60));
        set_mtime(&source, now);

        assert!(cache.needs_regeneration(&source, &output));
    }

    #[test]
    fn unreadable_source_needs_regeneration() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("gone.html");
        fs::write(&output, "stale").unwrap();

        let mut store = HashStore::empty(tmp.path());
        let source = tmp.path().join("gone.adoc");
        store.put(source_key(&source), "abc");
        let cache = IncrementalCache::with_store(store);

        assert!(cache.needs_regeneration(&source, &output));
    }

    #[test]
    fn corrupt_store_treats_everything_as_changed() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        let output = tmp.path().join("a.html");
        fs::write(&source, "= A").unwrap();
        fs::write(&output, "<h1>A</h1>").unwrap();
        fs::write(tmp.path().join(HASH_FILENAME), [0xc3, 0x28, 0xa0, 0xa1]).unwrap();

        let cache = IncrementalCache::open(tmp.path());
        assert!(cache.needs_regeneration(&source, &output));
    }

    #[test]
    fn cache_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let work = tmp.path().join("work");
        let source = tmp.path().join("a.adoc");
        let output = tmp.path().join("a.html");
        fs::write(&source, "= A").unwrap();

        let mut cache = IncrementalCache::open(&work);
        cache.record_hash(&source);
        cache.save();
        fs::write(&output, "<h1>A</h1>").unwrap();

        let reopened = IncrementalCache::open(&work);
        assert!(!reopened.needs_regeneration(&source, &output));
    }

    // =========================================================================
    // Recording hashes
    // =========================================================================

    #[test]
    fn record_hash_adds_entry() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        fs::write(&source, "content").unwrap();

        let mut cache = IncrementalCache::open(tmp.path());
        cache.record_hash(&source);

        assert_eq!(
            cache.store().get(&source_key(&source)),
            Some(hash_file(&source).unwrap().as_str())
        );
    }

    #[test]
    fn record_hash_overwrites_entry() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("a.adoc");
        let key = source_key(&source);
        let mut cache = IncrementalCache::open(tmp.path());

        fs::write(&source, "one").unwrap();
        cache.record_hash(&source);
        let first = cache.store().get(&key).unwrap().to_string();

        fs::write(&source, "two").unwrap();
        cache.record_hash(&source);
        assert_ne!(cache.store().get(&key).unwrap(), first);
    }

    #[test]
    fn record_hash_of_missing_file_leaves_store_unchanged() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("missing.adoc");
        let mut store = HashStore::empty(tmp.path());
        store.put(source_key(&source), "previous");
        let mut cache = IncrementalCache::with_store(store.clone());

        cache.record_hash(&source);
        cache.record_hash(&tmp.path().join("also-missing.adoc"));

        assert_eq!(cache.store(), &store);
    }

    // =========================================================================
    // Pruning
    // =========================================================================

    #[test]
    fn prune_keeps_current_files() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.adoc");
        let b = tmp.path().join("b.adoc");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let mut cache = IncrementalCache::open(tmp.path());
        cache.record_hash(&a);
        cache.record_hash(&b);
        cache.prune(&[a.clone(), b.clone()]);

        assert_eq!(cache.store().len(), 2);
    }

    #[test]
    fn prune_removes_deleted_files() {
        let tmp = TempDir::new().unwrap();
        let files: Vec<PathBuf> = ["a", "b", "c"]
            .iter()
            .map(|n| tmp.path().join(format!("{n}.adoc")))
            .collect();
        let mut cache = IncrementalCache::open(tmp.path());
        for f in &files {
            fs::write(f, f.to_string_lossy().as_bytes()).unwrap();
            cache.record_hash(f);
        }

        cache.prune(&files[..2]);

        assert_eq!(cache.store().len(), 2);
        assert!(cache.store().get(&source_key(&files[0])).is_some());
        assert!(cache.store().get(&source_key(&files[1])).is_some());
        assert!(cache.store().get(&source_key(&files[2])).is_none());
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    #[test]
    fn hash_file_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.adoc");
        fs::write(&path, b"hello world").unwrap();

        let h1 = hash_file(&path).unwrap();
        let h2 = hash_file(&path).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn same_content_in_different_files_hashes_equal() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.adoc");
        let b = tmp.path().join("b.adoc");
        fs::write(&a, "same").unwrap();
        fs::write(&b, "same").unwrap();
        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    // =========================================================================
    // Properties
    // =========================================================================

    proptest! {
        #[test]
        fn prune_keeps_exactly_the_current_keys(
            keys in prop::collection::btree_set("[a-z/ ._-]{1,16}", 0..24),
            mask in prop::collection::vec(any::<bool>(), 24),
        ) {
            let tmp = TempDir::new().unwrap();
            let mut store = HashStore::empty(tmp.path());
            for key in &keys {
                store.put(key.clone(), "d");
            }
            let current: HashSet<String> = keys
                .iter()
                .enumerate()
                .filter(|(i, _)| mask[*i])
                .map(|(_, k)| k.clone())
                .collect();

            store.remove_keys_not_in(&current);

            prop_assert!(store.keys().all(|k| current.contains(k)));
            prop_assert_eq!(store.len(), current.len());
        }

        #[test]
        fn store_roundtrips_through_disk(
            entries in prop::collection::btree_map("\\PC{1,24}", "[0-9a-f]{64}", 0..12),
        ) {
            let tmp = TempDir::new().unwrap();
            let mut store = HashStore::empty(tmp.path());
            for (k, v) in &entries {
                store.put(k.clone(), v.clone());
            }
            store.save().unwrap();
            prop_assert_eq!(HashStore::load(tmp.path()), store);
        }
    }
}
