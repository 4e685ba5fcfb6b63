//! Shared test utilities.
//!
//! Document-tree fixtures and a fake [`Renderer`] so pipeline tests run
//! without an external converter.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, config) = doc_tree(&[("index.adoc", "= Home\n\nHello")]);
//! let renderer = FakeRenderer::default();
//! let files = discovered(&config);
//! RenderPipeline::new(&renderer, &config).run(&files).unwrap();
//! assert_eq!(renderer.calls(), 1);
//! ```

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::config::BuildConfig;
use crate::discovery::FilePatternMatcher;
use crate::render::{RenderError, RenderOptions, Renderer};

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `content` at `dir/rel`, creating parent directories.
pub fn write_doc(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// A temp project with `docs/` holding `files`, and a config pointing every
/// directory into it. Diagrams are off so nothing touches the real converter.
pub fn doc_tree(files: &[(&str, &str)]) -> (TempDir, BuildConfig) {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    for (rel, content) in files {
        write_doc(&docs, rel, content);
    }

    let mut config = BuildConfig {
        source_directory: docs.display().to_string(),
        ..Default::default()
    };
    config.render.work_directory = tmp.path().join("work").display().to_string();
    config.render.output_directory = tmp.path().join("out").display().to_string();
    config.render.enable_diagrams = false;
    (tmp, config)
}

/// Files the configured patterns select, sorted.
pub fn discovered(config: &BuildConfig) -> Vec<PathBuf> {
    FilePatternMatcher::new(config.source_dir(), &config.includes, &config.excludes)
        .unwrap()
        .matched_files()
        .unwrap()
}

// =========================================================================
// Fake converter
// =========================================================================

/// Wraps each line in `<p>`. Content containing `FAIL` is rejected.
#[derive(Default)]
pub struct FakeRenderer {
    calls: Cell<usize>,
}

impl FakeRenderer {
    /// Number of conversions attempted, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Renderer for FakeRenderer {
    fn convert(&self, content: &str, _: &RenderOptions) -> Result<String, RenderError> {
        self.calls.set(self.calls.get() + 1);
        if content.contains("FAIL") {
            return Err(RenderError::EmptyOutput);
        }
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| format!("<p>{}</p>", line.trim()))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
