//! Source file discovery.
//!
//! Walks the source directory and selects files with Ant-style include and
//! exclude patterns, relative to the base directory:
//!
//! | Pattern          | Matches                                   |
//! |------------------|-------------------------------------------|
//! | `**/*.adoc`      | every `.adoc` file at any depth           |
//! | `guides/*.adoc`  | `.adoc` files directly inside `guides/`   |
//! | `drafts/`        | everything under `drafts/` (same as `drafts/**`) |
//! | `?.adoc`         | single-character names                    |
//!
//! Matching is case-insensitive. Results are sorted by path so builds are
//! reproducible.

use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("Invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

pub const DEFAULT_INCLUDES: &[&str] = &["**/*.adoc"];

/// Selects files under a base directory by include/exclude patterns.
#[derive(Debug, Clone)]
pub struct FilePatternMatcher {
    base: PathBuf,
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
}

impl FilePatternMatcher {
    /// Empty `includes` fall back to [`DEFAULT_INCLUDES`].
    pub fn new<S: AsRef<str>>(
        base: impl Into<PathBuf>,
        includes: &[S],
        excludes: &[S],
    ) -> Result<Self, DiscoveryError> {
        let includes: Result<Vec<Regex>, DiscoveryError> = if includes.is_empty() {
            DEFAULT_INCLUDES.iter().map(|p| compile_pattern(p)).collect()
        } else {
            includes.iter().map(|p| compile_pattern(p.as_ref())).collect()
        };
        Ok(Self {
            base: base.into(),
            includes: includes?,
            excludes: excludes
                .iter()
                .map(|p| compile_pattern(p.as_ref()))
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether a `/`-separated path relative to the base is selected.
    pub fn matches(&self, relative: &str) -> bool {
        self.includes.iter().any(|re| re.is_match(relative))
            && !self.excludes.iter().any(|re| re.is_match(relative))
    }

    /// All selected files, sorted, as `base.join(relative)`.
    ///
    /// A missing base directory yields an empty list.
    pub fn matched_files(&self) -> Result<Vec<PathBuf>, DiscoveryError> {
        if !self.base.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.base).sort_by_file_name() {
            let entry = entry.map_err(|source| DiscoveryError::Walk {
                path: self.base.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.base) else {
                continue;
            };
            let relative = relative_str(relative);
            if self.matches(&relative) {
                files.push(self.base.join(relative));
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn has_matched_files(&self) -> Result<bool, DiscoveryError> {
        Ok(!self.matched_files()?.is_empty())
    }
}

fn relative_str(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Translate an Ant-style pattern into an anchored, case-insensitive regex.
fn compile_pattern(pattern: &str) -> Result<Regex, DiscoveryError> {
    let mut normalized = pattern.replace('\\', "/");
    if normalized.ends_with('/') {
        normalized.push_str("**");
    }
    let normalized = normalized.trim_start_matches("./");

    let mut re = String::from("(?i)^");
    let chars: Vec<char> = normalized.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                if chars.get(i) == Some(&'/') {
                    // `**/` spans zero or more whole directories
                    re.push_str("(?:[^/]*/)*");
                    i += 1;
                } else {
                    re.push_str(".*");
                }
                continue;
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }
    re.push('$');

    Regex::new(&re).map_err(|source| DiscoveryError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}
