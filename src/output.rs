//! CLI output formatting for all commands.
//!
//! Logging (through `tracing`) narrates a run as it happens; the summaries
//! here are what a command prints once it is done.
//!
//! # Output Format
//!
//! ## Sources
//!
//! ```text
//! Sources (2)
//! 001 guides/install.adoc
//! 002 index.adoc
//! ```
//!
//! ## Render
//!
//! ```text
//! Render → target/generated-docs
//!     2 generated, 5 unchanged (7 total)
//! ```
//!
//! ## Lint
//!
//! ```text
//! Linting complete
//!     Documents: 4
//!     Errors: 1
//!     Warnings: 2
//! ```
//!
//! ## Validate
//!
//! ```text
//! === Validation Errors ===
//!
//! File: b.adoc
//!     - [IO_ERROR] Failed to read file: permission denied
//!
//! Total errors: 1 in 1 file(s)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::lint::LintSummary;
use crate::metadata::relative_path;
use crate::render::RenderSummary;
use crate::validate::ValidationReport;
use std::path::{Path, PathBuf};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

// ============================================================================
// Sources
// ============================================================================

/// Discovered files, relative to the source directory.
pub fn format_sources(files: &[PathBuf], source_dir: &Path) -> Vec<String> {
    let mut lines = vec![format!("Sources ({})", files.len())];
    for (i, file) in files.iter().enumerate() {
        lines.push(format!(
            "{} {}",
            format_index(i + 1),
            relative_path(source_dir, file)
        ));
    }
    lines
}

pub fn print_sources(files: &[PathBuf], source_dir: &Path) {
    for line in format_sources(files, source_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

/// `label` is `Render` for documents and `Render YAML` for data files.
pub fn format_render_summary(label: &str, summary: &RenderSummary, output_dir: &Path) -> Vec<String> {
    vec![
        format!("{} → {}", label, output_dir.display()),
        format!("{}{}", indent(1), summary),
    ]
}

pub fn print_render_summary(label: &str, summary: &RenderSummary, output_dir: &Path) {
    for line in format_render_summary(label, summary, output_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Lint
// ============================================================================

pub fn format_lint_summary(summary: &LintSummary) -> Vec<String> {
    vec![
        "Linting complete".to_string(),
        format!("{}Documents: {}", indent(1), summary.documents),
        format!("{}Errors: {}", indent(1), summary.errors),
        format!("{}Warnings: {}", indent(1), summary.warnings),
    ]
}

pub fn print_lint_summary(summary: &LintSummary) {
    for line in format_lint_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Validate
// ============================================================================

/// Errors grouped by file, or a success line.
pub fn format_validation_report(report: &ValidationReport) -> Vec<String> {
    if report.is_valid() {
        return vec![format!(
            "All files validated successfully! ({} documents)",
            report.documents
        )];
    }

    let grouped = report.errors_by_file();
    let mut lines = vec!["=== Validation Errors ===".to_string()];
    for (file, errors) in &grouped {
        lines.push(String::new());
        lines.push(format!("File: {}", file));
        for error in errors {
            lines.push(format!("{}- [{}] {}", indent(1), error.kind, error.message));
        }
    }
    lines.push(String::new());
    lines.push(format!(
        "Total errors: {} in {} file(s)",
        report.errors.len(),
        grouped.len()
    ));
    lines
}

pub fn print_validation_report(report: &ValidationReport) {
    for line in format_validation_report(report) {
        println!("{}", line);
    }
}
