//! Metadata validation against a JSON Schema.
//!
//! Collects the metadata of every document (see [`crate::metadata`]) into
//! one collection, optionally exports it, and validates the collection as a
//! whole against the configured schema. Problems are gathered rather than
//! raised, so a single run reports everything wrong at once.

use crate::config::{SchemaVersion, ValidateConfig};
use crate::metadata::{MetadataCollector, collect_document_metadata, relative_path};
use jsonschema::Draft;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to load schema from {path}: {message}")]
    Schema { path: PathBuf, message: String },
    #[error("Validation failed with {0} error(s)")]
    Failed(usize),
}

/// Category of a reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A document couldn't be read.
    Io,
    /// The metadata export couldn't be written.
    Export,
    /// The collection violates the schema.
    SchemaValidation,
    /// The schema couldn't be loaded or applied.
    Validation,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::Export => "EXPORT_ERROR",
            ErrorKind::SchemaValidation => "SCHEMA_VALIDATION",
            ErrorKind::Validation => "VALIDATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported problem. `file` is the document path, or `EXPORT` /
/// `VALIDATION` for problems not tied to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub file: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ValidationError {
    fn new(file: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Result of a validation run.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub documents: usize,
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Errors grouped by file, files sorted.
    pub fn errors_by_file(&self) -> BTreeMap<&str, Vec<&ValidationError>> {
        let mut grouped: BTreeMap<&str, Vec<&ValidationError>> = BTreeMap::new();
        for error in &self.errors {
            grouped.entry(error.file.as_str()).or_default().push(error);
        }
        grouped
    }

    pub fn check(&self, fail_on_error: bool) -> Result<(), ValidateError> {
        if !self.errors.is_empty() && fail_on_error {
            return Err(ValidateError::Failed(self.errors.len()));
        }
        Ok(())
    }
}

pub fn draft_for(version: SchemaVersion) -> Draft {
    match version {
        SchemaVersion::V4 => Draft::Draft4,
        SchemaVersion::V6 => Draft::Draft6,
        SchemaVersion::V7 => Draft::Draft7,
        SchemaVersion::V201909 => Draft::Draft201909,
        SchemaVersion::V202012 => Draft::Draft202012,
    }
}

/// Read and compile a schema file for the given draft.
pub fn load_validator(
    schema_file: &Path,
    version: SchemaVersion,
) -> Result<jsonschema::Validator, ValidateError> {
    let content = fs::read_to_string(schema_file)?;
    let schema: Value = serde_json::from_str(&content)?;
    jsonschema::options()
        .with_draft(draft_for(version))
        .build(&schema)
        .map_err(|e| ValidateError::Schema {
            path: schema_file.to_path_buf(),
            message: e.to_string(),
        })
}

/// Every schema violation of `instance`, with its location when not at
/// the root.
pub fn schema_violations(validator: &jsonschema::Validator, instance: &Value) -> Vec<ValidationError> {
    validator
        .iter_errors(instance)
        .map(|err| {
            let location = err.instance_path.to_string();
            let message = if location.is_empty() {
                err.to_string()
            } else {
                format!("{location}: {err}")
            };
            ValidationError::new("VALIDATION", ErrorKind::SchemaValidation, message)
        })
        .collect()
}

/// Gather metadata for `files`. Unreadable files become `IO_ERROR`
/// entries; with `fail_fast` collection stops at the first one.
pub fn collect_metadata(
    source_dir: &Path,
    files: &[PathBuf],
    config: &ValidateConfig,
) -> (MetadataCollector, Vec<ValidationError>) {
    let mut collector = MetadataCollector::new();
    let mut errors = Vec::new();
    let no_attributes = BTreeMap::new();

    for file in files {
        let relative = relative_path(source_dir, file);
        tracing::info!("Processing file: {relative}");
        match collect_document_metadata(source_dir, file, &no_attributes) {
            Ok(info) => {
                let metadata = info.to_metadata(config.include_attributes);
                if tracing::enabled!(tracing::Level::DEBUG)
                    && let Ok(pretty) = serde_json::to_string_pretty(&metadata)
                {
                    tracing::debug!("Collected metadata for {relative}:\n{pretty}");
                }
                collector.add_document(relative, metadata);
            }
            Err(e) => {
                errors.push(ValidationError::new(
                    file.display().to_string(),
                    ErrorKind::Io,
                    format!("Failed to read file: {e}"),
                ));
                if config.fail_fast {
                    tracing::warn!("Stopping at first unreadable file (fail_fast)");
                    break;
                }
            }
        }
    }
    (collector, errors)
}

/// Collect, export and validate. Never fails; every problem ends up in
/// the report.
pub fn validate_documents(
    source_dir: &Path,
    files: &[PathBuf],
    config: &ValidateConfig,
) -> ValidationReport {
    let (collector, mut errors) = collect_metadata(source_dir, files, config);

    if let Some(export) = &config.metadata_export_file
        && !collector.is_empty()
    {
        let export = PathBuf::from(export);
        match collector.export(&export) {
            Ok(()) => {
                tracing::info!("Metadata exported to: {}", export.display());
                tracing::info!("Exported metadata for {} documents", collector.size());
            }
            Err(e) => errors.push(ValidationError::new(
                "EXPORT",
                ErrorKind::Export,
                format!("Failed to export metadata: {e}"),
            )),
        }
    }

    if let Some(schema_file) = &config.schema_file
        && !collector.is_empty()
    {
        match load_validator(Path::new(schema_file), config.schema_version) {
            Ok(validator) => {
                let violations = schema_violations(&validator, &collector.to_json());
                if !violations.is_empty() {
                    tracing::info!("Validation found {} issues", violations.len());
                }
                errors.extend(violations);
                tracing::info!(
                    "Validation completed: {} documents validated",
                    collector.size()
                );
            }
            Err(e) => errors.push(ValidationError::new(
                "VALIDATION",
                ErrorKind::Validation,
                format!("Failed to validate: {e}"),
            )),
        }
    }

    ValidationReport {
        documents: collector.size(),
        errors,
    }
}
