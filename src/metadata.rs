//! Document metadata collection.
//!
//! Each document contributes a JSON object built from its header and front
//! matter. Render passes the object to templates; validation gathers every
//! document into one collection and checks it against a JSON Schema.
//!
//! ## Per-document shape
//!
//! ```json
//! {
//!   "_file": "guides/install.adoc",
//!   "_title": "Installation Guide",
//!   "frontmatter": { "category": "guide" },
//!   "attributes": { "toc": "left", "doctitle": "Installation Guide" }
//! }
//! ```
//!
//! `frontmatter` is only present when the document has a non-blank front
//! matter block; `_title` is `null` for documents without a title.
//!
//! ## Collection shape
//!
//! ```json
//! { "documents": [ { "path": "...", "metadata": { ... } } ],
//!   "timestamp": "2024-03-01T10:00:00.000Z",
//!   "count": 1 }
//! ```

use crate::frontmatter::parse_front_matter;
use crate::header::DocumentHeader;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Metadata read from a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    /// Path relative to the source directory, `/`-separated.
    pub relative_path: String,
    pub title: Option<String>,
    pub front_matter: Option<Map<String, Value>>,
    /// Header attributes with configured attributes layered on top.
    pub attributes: Map<String, Value>,
}

impl DocumentInfo {
    /// Build the per-document JSON object.
    pub fn to_metadata(&self, include_attributes: bool) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("_file".into(), Value::String(self.relative_path.clone()));
        metadata.insert(
            "_title".into(),
            self.title.clone().map_or(Value::Null, Value::String),
        );
        if let Some(front_matter) = &self.front_matter {
            metadata.insert("frontmatter".into(), Value::Object(front_matter.clone()));
        }
        if include_attributes {
            metadata.insert("attributes".into(), Value::Object(self.attributes.clone()));
        }
        metadata
    }
}

/// Read `file` and extract its metadata.
///
/// Configured attributes override attributes set in the document, the way
/// attributes passed to the converter do.
pub fn collect_document_metadata(
    source_dir: &Path,
    file: &Path,
    configured: &BTreeMap<String, String>,
) -> io::Result<DocumentInfo> {
    let content = fs::read_to_string(file)?;
    let header = DocumentHeader::parse(&content);

    let front_matter = header
        .front_matter
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .map(parse_front_matter);

    let attributes = header
        .attributes
        .into_iter()
        .chain(configured.iter().map(|(k, v)| (k.clone(), v.clone())))
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    Ok(DocumentInfo {
        relative_path: relative_path(source_dir, file),
        title: header.title,
        front_matter,
        attributes,
    })
}

/// Display form of `file` relative to `base`, always `/`-separated.
///
/// A file outside `base` keeps its full path.
pub fn relative_path(base: &Path, file: &Path) -> String {
    match file.strip_prefix(base) {
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => file.to_string_lossy().replace('\\', "/"),
    }
}

/// One entry of the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub path: String,
    pub metadata: Map<String, Value>,
}

/// Accumulates metadata of all documents in a validation run.
#[derive(Debug, Default)]
pub struct MetadataCollector {
    documents: Vec<DocumentMetadata>,
}

impl MetadataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, path: impl Into<String>, metadata: Map<String, Value>) {
        self.documents.push(DocumentMetadata {
            path: path.into(),
            metadata,
        });
    }

    pub fn documents(&self) -> &[DocumentMetadata] {
        &self.documents
    }

    pub fn size(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }

    /// The collection as one JSON value, stamped with the current time.
    pub fn to_json(&self) -> Value {
        json!({
            "documents": self.documents,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "count": self.documents.len(),
        })
    }

    /// Write the collection as pretty JSON, creating parent directories.
    pub fn export(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.to_json())?;
        fs::write(path, json)
    }
}
