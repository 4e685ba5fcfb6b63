//! AsciiDoc embedded in YAML.
//!
//! Data files can carry AsciiDoc in scalars tagged `!asciidoc`:
//!
//! ```yaml
//! product:
//!   summary: !asciidoc |
//!     The *fastest* widget.
//!   features:
//!     - !asciidoc Works with `stdin`.
//! ```
//!
//! Each fragment is addressed by its path in the document: `product.summary`,
//! `product.features[0]`. A tagged scalar at the document root has the path
//! `""`. The lint command checks fragments individually; `render-yaml`
//! replaces each fragment with its rendered HTML and writes the YAML back out
//! in block style.
//!
//! Fragments keep their source text: `!asciidoc 1.10` is the string `1.10`,
//! not a number. `!asciidoc` must tag a scalar; on a mapping or sequence the
//! file is rejected.

use crate::metadata::relative_path;
use crate::render::{RenderOptions, RenderSummary, Renderer};
use serde::de::{self, Deserialize, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ASCIIDOC_TAG: &str = "!asciidoc";

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One `!asciidoc` fragment and where it sits in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub content: String,
    pub path: String,
}

// =========================================================================
// Document tree
// =========================================================================

/// A parsed YAML document with `!asciidoc` scalars held as their source text.
#[derive(Debug)]
enum Node {
    Fragment(String),
    Tagged(Tag, Box<Node>),
    Mapping(Vec<(Value, Node)>),
    Sequence(Vec<Node>),
    Scalar(Value),
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NodeVisitor)
    }
}

struct NodeVisitor;

impl<'de> Visitor<'de> for NodeVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any YAML value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Bool(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Number(v.into())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Number(v.into())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Number(v.into())))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Node, E> {
        Ok(Node::Scalar(Value::String(v.to_owned())))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Node, E> {
        Ok(Node::Scalar(Value::String(v)))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_none<E: de::Error>(self) -> Result<Node, E> {
        Ok(Node::Scalar(Value::Null))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Node, D::Error> {
        Node::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Node, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Node::Sequence(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry::<Value, Node>()? {
            entries.push(entry);
        }
        Ok(Node::Mapping(entries))
    }

    // serde_yaml hands tagged nodes over as enums named after the tag.
    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Node, A::Error> {
        let (tag, variant): (String, _) = data.variant()?;
        let tag = Tag::new(tag);
        if tag == ASCIIDOC_TAG {
            // Read as a string so the scalar is never resolved to a number or bool.
            variant.newtype_variant::<String>().map(Node::Fragment)
        } else {
            let inner = variant.newtype_variant::<Node>()?;
            Ok(Node::Tagged(tag, Box::new(inner)))
        }
    }
}

fn parse(text: &str) -> Result<Node, YamlError> {
    Ok(serde_yaml::from_str(text)?)
}

// =========================================================================
// Extraction
// =========================================================================

/// All `!asciidoc` fragments in source order.
pub fn extract_asciidoc(text: &str) -> Result<Vec<ExtractedContent>, YamlError> {
    let node = parse(text)?;
    let mut found = Vec::new();
    collect(&node, String::new(), &mut found);
    Ok(found)
}

/// Read a file and extract its fragments.
pub fn extract_asciidoc_file(path: &Path) -> Result<Vec<ExtractedContent>, YamlError> {
    extract_asciidoc(&fs::read_to_string(path)?)
}

fn collect(node: &Node, path: String, found: &mut Vec<ExtractedContent>) {
    match node {
        Node::Fragment(content) => {
            tracing::debug!("Extracted AsciiDoc content at path: {path}");
            found.push(ExtractedContent {
                content: content.clone(),
                path,
            });
        }
        Node::Tagged(_, inner) => collect(inner, path, found),
        Node::Mapping(entries) => {
            for (key, value) in entries {
                collect(value, child_path(&path, key), found);
            }
        }
        Node::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                collect(item, format!("{path}[{i}]"), found);
            }
        }
        Node::Scalar(_) => {}
    }
}

fn child_path(parent: &str, key: &Value) -> String {
    let key = match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    };
    if parent.is_empty() {
        key
    } else {
        format!("{parent}.{key}")
    }
}

// =========================================================================
// Rendering
// =========================================================================

/// Replace every `!asciidoc` fragment with its rendered HTML.
///
/// A fragment that fails to render becomes an HTML comment carrying the
/// error so the rest of the file still comes out.
pub fn render_yaml<R: Renderer>(
    text: &str,
    renderer: &R,
    options: &RenderOptions,
) -> Result<String, YamlError> {
    let value = replace_fragments(parse(text)?, renderer, options);
    Ok(serde_yaml::to_string(&value)?)
}

fn replace_fragments<R: Renderer>(node: Node, renderer: &R, options: &RenderOptions) -> Value {
    match node {
        Node::Fragment(content) => Value::String(render_fragment(&content, renderer, options)),
        Node::Tagged(tag, inner) => Value::Tagged(Box::new(TaggedValue {
            tag,
            value: replace_fragments(*inner, renderer, options),
        })),
        Node::Mapping(entries) => Value::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (key, replace_fragments(value, renderer, options)))
                .collect::<Mapping>(),
        ),
        Node::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| replace_fragments(item, renderer, options))
                .collect(),
        ),
        Node::Scalar(value) => value,
    }
}

fn render_fragment<R: Renderer>(content: &str, renderer: &R, options: &RenderOptions) -> String {
    tracing::debug!("Rendering AsciiDoc fragment");
    match renderer.convert(content, options) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Failed to render AsciiDoc content: {e}");
            format!("<!-- Error rendering AsciiDoc: {e} -->")
        }
    }
}

/// Render the fragments of each file into `output_dir`, keeping paths
/// relative to `source_dir`. A file outside `source_dir` lands at the top of
/// `output_dir` under its own name. A file that can't be read or parsed
/// counts as failed and the rest go on.
pub fn render_yaml_files<R: Renderer>(
    files: &[PathBuf],
    source_dir: &Path,
    output_dir: &Path,
    renderer: &R,
    options: &RenderOptions,
) -> RenderSummary {
    let mut summary = RenderSummary::default();
    for file in files {
        let relative = match file.strip_prefix(source_dir) {
            Ok(_) => relative_path(source_dir, file),
            Err(_) => file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let target = output_dir.join(relative);
        match render_yaml_file(file, &target, renderer, options) {
            Ok(()) => {
                tracing::info!("Generated: {}", target.display());
                summary.generated += 1;
            }
            Err(e) => {
                tracing::error!("Error processing YAML file {}: {e}", file.display());
                summary.failed += 1;
            }
        }
    }
    summary
}

fn render_yaml_file<R: Renderer>(
    file: &Path,
    target: &Path,
    renderer: &R,
    options: &RenderOptions,
) -> Result<(), YamlError> {
    tracing::info!("Processing: {}", file.display());
    let text = fs::read_to_string(file)?;
    let rendered = render_yaml(&text, renderer, options)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderError;
    use tempfile::TempDir;

    /// Wraps content in a paragraph; fails on content containing "FAIL".
    struct ParagraphRenderer;

    impl Renderer for ParagraphRenderer {
        fn convert(&self, content: &str, _: &RenderOptions) -> Result<String, RenderError> {
            if content.contains("FAIL") {
                return Err(RenderError::EmptyOutput);
            }
            Ok(format!("<p>{}</p>", content.trim()))
        }
    }

    fn paths(found: &[ExtractedContent]) -> Vec<&str> {
        found.iter().map(|e| e.path.as_str()).collect()
    }

    // =========================================================================
    // extract_asciidoc
    // =========================================================================

    #[test]
    fn extracts_nested_paths_in_source_order() {
        let yaml = r#"
product:
  summary: !asciidoc "The *fastest* widget."
  name: Widget
  features:
    - !asciidoc "Works with `stdin`."
    - plain
    - details: !asciidoc "Deep"
footer: !asciidoc "Bye"
"#;
        let found = extract_asciidoc(yaml).unwrap();
        assert_eq!(
            paths(&found),
            vec![
                "product.summary",
                "product.features[0]",
                "product.features[2].details",
                "footer"
            ]
        );
        assert_eq!(found[0].content, "The *fastest* widget.");
    }

    #[test]
    fn root_scalar_has_empty_path() {
        let found = extract_asciidoc("!asciidoc \"= Title\"").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, "");
        assert_eq!(found[0].content, "= Title");
    }

    #[test]
    fn root_sequence_paths() {
        let found = extract_asciidoc("- !asciidoc a\n- !asciidoc b\n").unwrap();
        assert_eq!(paths(&found), vec!["[0]", "[1]"]);
    }

    #[test]
    fn block_scalars_keep_newlines() {
        let found = extract_asciidoc("text: !asciidoc |\n  line one\n  line two\n").unwrap();
        assert_eq!(found[0].content, "line one\nline two\n");
    }

    #[test]
    fn untagged_yaml_has_no_fragments() {
        assert!(extract_asciidoc("a: 1\nb: [x, y]\n").unwrap().is_empty());
        assert!(extract_asciidoc("").unwrap().is_empty());
    }

    #[test]
    fn other_tags_are_looked_through() {
        let found = extract_asciidoc("a: !custom\n  b: !asciidoc x\n").unwrap();
        assert_eq!(paths(&found), vec!["a.b"]);
    }

    #[test]
    fn numeric_keys_in_paths() {
        let found = extract_asciidoc("2024:\n  notes: !asciidoc x\n").unwrap();
        assert_eq!(paths(&found), vec!["2024.notes"]);
    }

    #[test]
    fn invalid_yaml_is_error() {
        assert!(matches!(extract_asciidoc("a: [unclosed"), Err(YamlError::Yaml(_))));
    }

    #[test]
    fn fragments_keep_their_source_text() {
        let found = extract_asciidoc("a: !asciidoc 1.10\nb: !asciidoc 0x10\nc: !asciidoc yes\n").unwrap();
        let contents: Vec<&str> = found.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["1.10", "0x10", "yes"]);
    }

    #[test]
    fn asciidoc_tag_on_a_mapping_is_an_error() {
        assert!(matches!(
            extract_asciidoc("a: !asciidoc\n  b: c\n"),
            Err(YamlError::Yaml(_))
        ));
    }

    // =========================================================================
    // render_yaml
    // =========================================================================

    #[test]
    fn replaces_fragments_with_html() {
        let yaml = "title: Plain\nbody: !asciidoc Hello\nlist:\n  - !asciidoc Item\n";
        let out = render_yaml(yaml, &ParagraphRenderer, &RenderOptions::default()).unwrap();
        let value: Value = serde_yaml::from_str(&out).unwrap();

        assert_eq!(value["title"], Value::from("Plain"));
        assert_eq!(value["body"], Value::from("<p>Hello</p>"));
        assert_eq!(value["list"][0], Value::from("<p>Item</p>"));
        assert!(!out.contains("!asciidoc"));
    }

    #[test]
    fn failed_fragment_becomes_comment() {
        let out = render_yaml("a: !asciidoc FAIL\nb: !asciidoc ok\n", &ParagraphRenderer, &RenderOptions::default())
            .unwrap();
        let value: Value = serde_yaml::from_str(&out).unwrap();
        let a = value["a"].as_str().unwrap();
        assert!(a.starts_with("<!-- Error rendering AsciiDoc:"), "{a}");
        assert_eq!(value["b"], Value::from("<p>ok</p>"));
    }

    #[test]
    fn renderer_receives_fragment_source_text() {
        let out = render_yaml("v: !asciidoc 1.10\nh: !asciidoc 0x10\n", &ParagraphRenderer, &RenderOptions::default())
            .unwrap();
        let value: Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(value["v"], Value::from("<p>1.10</p>"));
        assert_eq!(value["h"], Value::from("<p>0x10</p>"));
    }

    #[test]
    fn untagged_values_and_other_tags_survive() {
        let out = render_yaml("n: 1.5\nt: !custom {x: !asciidoc y}\n", &ParagraphRenderer, &RenderOptions::default())
            .unwrap();
        let value: Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(value["n"], Value::from(1.5));
        assert!(out.contains("!custom"), "{out}");
        assert!(out.contains("<p>y</p>"), "{out}");
    }

    #[test]
    fn output_is_block_style() {
        let out = render_yaml("a:\n  b: !asciidoc x\n", &ParagraphRenderer, &RenderOptions::default())
            .unwrap();
        assert!(out.starts_with("a:\n  b: "), "{out}");
        assert!(!out.contains('{'), "{out}");
    }

    // =========================================================================
    // render_yaml_files
    // =========================================================================

    #[test]
    fn renders_files_into_output_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        fs::create_dir_all(src.join("data")).unwrap();
        fs::write(src.join("data/p.yaml"), "x: !asciidoc Hi\n").unwrap();
        fs::write(src.join("bad.yaml"), "x: [unclosed\n").unwrap();

        let files = vec![src.join("data/p.yaml"), src.join("bad.yaml")];
        let summary = render_yaml_files(&files, &src, &out, &ParagraphRenderer, &RenderOptions::default());

        assert_eq!(summary.generated, 1);
        assert_eq!(summary.failed, 1);
        let written = fs::read_to_string(out.join("data/p.yaml")).unwrap();
        assert!(written.contains("<p>Hi</p>"));
    }

    #[test]
    fn file_outside_source_dir_lands_in_output_dir() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        fs::create_dir_all(&src).unwrap();
        let stray = tmp.path().join("stray.yaml");
        fs::write(&stray, "x: !asciidoc Hi\n").unwrap();

        let summary = render_yaml_files(&[stray], &src, &out, &ParagraphRenderer, &RenderOptions::default());

        assert_eq!(summary.generated, 1);
        assert!(out.join("stray.yaml").is_file());
    }
}
