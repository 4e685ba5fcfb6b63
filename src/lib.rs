//! # asciidoc-build
//!
//! Lint, validate, and render a tree of AsciiDoc documents. The source
//! directory is the data source: include/exclude patterns pick the documents,
//! and each one becomes a file in the output tree at the same relative path.
//!
//! # Architecture: Three Independent Commands
//!
//! Each command discovers the same set of sources and works on it alone:
//!
//! ```text
//! lint      sources  →  findings             (external linter per document)
//! validate  sources  →  metadata.json        (header metadata vs. JSON Schema)
//! render    sources  →  target/generated-docs (asciidoctor + page template)
//! ```
//!
//! Rendering is incremental. A hash store in the work directory remembers the
//! SHA-256 of every source converted successfully; unchanged sources whose
//! output still exists are skipped. Keys are source paths as discovery
//! produced them, source directory included:
//!
//! ```text
//! target/asciidoc-work/.asciidoc.hashes
//!   src/docs/asciidoc/guides/install.adoc=9f86d08...
//!   src/docs/asciidoc/index.adoc=2c26b46...
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `asciidoc.toml` loading, merging over stock defaults, validation |
//! | [`discovery`] | Ant-style include/exclude patterns and the directory walk |
//! | [`cache`] | Hash store and the regenerate-or-skip decision |
//! | [`properties`] | Line-oriented `key=value` codec used by the hash store |
//! | [`header`] | Document header scan: front matter, title, attribute entries |
//! | [`frontmatter`] | YAML front matter splitting and parsing |
//! | [`metadata`] | Per-document metadata and the exportable collection |
//! | [`render`] | Converter trait, `asciidoctor` invocation, the render pipeline |
//! | [`template`] | Jinja page templates and error excerpts |
//! | [`indent`] | Common-indent removal for inline templates |
//! | [`yaml`] | `!asciidoc` fragments inside YAML data files |
//! | [`lint`] | Linter trait, command-line linter, lint summary |
//! | [`validate`] | JSON Schema validation of collected metadata |
//! | [`process`] | Spawning external tools with piped stdin |
//! | [`report`] | Severity detection and relaying tool output into `tracing` |
//! | [`output`] | CLI summaries printed after each command |
//!
//! # Design Decisions
//!
//! ## External Tools Behind Traits
//!
//! Conversion and linting shell out to `asciidoctor` and a configurable linter
//! command. Both sit behind a trait ([`render::Renderer`],
//! [`lint::Linter`]) so the pipelines are tested with in-process fakes and no
//! Ruby installation.
//!
//! ## Content Hashes Over Timestamps
//!
//! A checkout, a `touch`, or a copy changes timestamps without changing
//! content. The cache compares SHA-256 digests first and only then consults
//! timestamps, so a source edited after its output was written is still
//! rebuilt.
//!
//! ## Failures Stay Local
//!
//! One broken document never stops a render: it is logged, counted, and left
//! out of the hash store so the next run retries it. A corrupt hash store is
//! treated as empty, which means a full rebuild and nothing worse.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod frontmatter;
pub mod header;
pub mod indent;
pub mod lint;
pub mod metadata;
pub mod output;
pub mod process;
pub mod properties;
pub mod render;
pub mod report;
pub mod template;
pub mod validate;
pub mod yaml;

#[cfg(test)]
pub(crate) mod test_helpers;
