//! Page templates around rendered documents.
//!
//! The converter produces an HTML fragment per document. A template can wrap
//! it into a page using the document's metadata. Templates are Jinja syntax
//! (via `minijinja`) and see four variables:
//!
//! | Variable      | Content                                            |
//! |---------------|----------------------------------------------------|
//! | `html`        | the rendered fragment                              |
//! | `attributes`  | header attributes merged with configured ones      |
//! | `frontMatter` | the front matter mapping, empty when absent        |
//! | `metadata`    | the full per-document metadata object              |
//!
//! Template text is de-indented first so templates can be written inline in
//! an indented config block. Output is never auto-escaped: `html` is
//! already markup.

use crate::config::RenderConfig;
use crate::indent::remove_common_indentation;
use maud::{DOCTYPE, PreEscaped, html};
use minijinja::{AutoEscape, Environment};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const INLINE_TEMPLATE_NAME: &str = "inline-template";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to load template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Template content cannot be empty")]
    EmptyTemplate,
    #[error("Template processing failed for {name}: {source}")]
    Render {
        name: String,
        source: minijinja::Error,
    },
}

/// Variables handed to a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentContext {
    pub html: String,
    pub attributes: Map<String, Value>,
    #[serde(rename = "frontMatter")]
    pub front_matter: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

/// Compiles and renders Jinja templates against a [`DocumentContext`].
pub struct TemplateProcessor {
    env: Environment<'static>,
}

impl Default for TemplateProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateProcessor {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        Self { env }
    }

    pub fn process_inline(
        &self,
        source: &str,
        context: &DocumentContext,
    ) -> Result<String, TemplateError> {
        if source.trim().is_empty() {
            return Err(TemplateError::EmptyTemplate);
        }
        tracing::debug!("Processing inline template");
        self.render(INLINE_TEMPLATE_NAME, source, context)
    }

    pub fn process_file(
        &self,
        path: &Path,
        context: &DocumentContext,
    ) -> Result<String, TemplateError> {
        tracing::debug!(template = %path.display(), "Processing template");
        let source = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.render(&path.display().to_string(), &source, context)
    }

    fn render(
        &self,
        name: &str,
        source: &str,
        context: &DocumentContext,
    ) -> Result<String, TemplateError> {
        let source = remove_common_indentation(source);
        self.env.render_named_str(name, &source, context).map_err(|err| {
            tracing::error!("Template error in {name}: {err}");
            if let Some(line) = err.line() {
                let column = err.range().map(|range| column_of(&source, range.start));
                tracing::error!("Template error context in {name}:");
                for context_line in format_error_context(&source, line, column) {
                    tracing::error!("{context_line}");
                }
            }
            TemplateError::Render {
                name: name.to_string(),
                source: err,
            }
        })
    }
}

/// 1-based column of a byte offset within its line.
fn column_of(source: &str, offset: usize) -> usize {
    let offset = offset.min(source.len());
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    source[line_start..offset].chars().count() + 1
}

/// Lines around a template error: three before and after the failing
/// line, which is marked ` >>> `, plus a `^` under the column when known.
///
/// ```text
///   1     <article>
///   2 >>>   {{ html | nope }}
///                    ^ Error here
///   3     </article>
/// ```
pub fn format_error_context(source: &str, line: usize, column: Option<usize>) -> Vec<String> {
    let lines: Vec<&str> = source.split('\n').collect();
    if line == 0 || line > lines.len() {
        return Vec::new();
    }

    let start = line.saturating_sub(4);
    let end = (line + 3).min(lines.len());
    let mut out = Vec::new();

    for (i, text) in lines.iter().enumerate().take(end).skip(start) {
        let is_error_line = i + 1 == line;
        let marker = if is_error_line { " >>> " } else { "     " };
        let prefix = format!("{:3}{marker}", i + 1);
        out.push(format!("{prefix}{text}"));

        if is_error_line && let Some(column) = column.filter(|c| *c > 0) {
            let mut pointer = " ".repeat(prefix.len());
            for c in text.chars().chain(std::iter::repeat(' ')).take(column - 1) {
                pointer.push(if c == '\t' { '\t' } else { ' ' });
            }
            pointer.push_str("^ Error here");
            out.push(pointer);
        }
    }
    out
}

/// Wrap a rendered fragment in a complete HTML5 document.
pub fn standalone_document(title: &str, body: &str) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
            }
            body {
                (PreEscaped(body))
            }
        }
    }
    .into_string()
}

/// How rendered documents become output files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageTemplate {
    Inline(String),
    File(PathBuf),
    Standalone,
    Passthrough,
}

impl PageTemplate {
    /// The inline template wins when both kinds are configured.
    pub fn from_config(render: &RenderConfig) -> Self {
        match (&render.template, &render.template_file) {
            (Some(inline), file) => {
                if file.is_some() {
                    tracing::warn!(
                        "Both template (inline) and template_file are configured. Using inline template."
                    );
                }
                PageTemplate::Inline(inline.clone())
            }
            (None, Some(file)) => PageTemplate::File(PathBuf::from(file)),
            (None, None) if render.standalone => PageTemplate::Standalone,
            (None, None) => PageTemplate::Passthrough,
        }
    }

    pub fn apply(
        &self,
        processor: &TemplateProcessor,
        context: &DocumentContext,
    ) -> Result<String, TemplateError> {
        match self {
            PageTemplate::Inline(source) => processor.process_inline(source, context),
            PageTemplate::File(path) => processor.process_file(path, context),
            PageTemplate::Standalone => {
                let title = context
                    .metadata
                    .get("_title")
                    .and_then(Value::as_str)
                    .unwrap_or("Document");
                Ok(standalone_document(title, &context.html))
            }
            PageTemplate::Passthrough => Ok(context.html.clone()),
        }
    }
}
