//! Build configuration.
//!
//! Handles loading, validating, and merging `asciidoc.toml`. The user file is
//! sparse: it is merged on top of the stock defaults, so it only needs the
//! keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source_directory = "src/docs/asciidoc"
//! includes = ["**/*.adoc"]
//! excludes = []
//! skip = false
//! safe_mode = "safe"           # unsafe | safe | server | secure
//!
//! [render]
//! work_directory = "target/asciidoc-work"
//! output_directory = "target/generated-docs"
//! fail_on_no_files = false
//! enable_diagrams = true
//! diagram_format = "svg"
//! enable_incremental = true
//! output_format = "html"
//! standalone = false
//! yaml_includes = ["**/*.yaml", "**/*.yml"]
//!
//! [render.attributes]
//! toc = "left"
//!
//! [renderer]
//! program = "asciidoctor"
//!
//! [lint]
//! rule_file = "lint-rules.yaml"
//! fail_on_error = true
//! command = ["asciidoc-linter", "--rule", "{rules}", "--input", "{file}"]
//! include_yaml = false
//!
//! [validate]
//! schema_version = "V7"
//! fail_on_error = true
//! fail_fast = false
//! schema_file = "schema.json"
//! include_attributes = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "asciidoc.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from `asciidoc.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory searched for AsciiDoc sources.
    pub source_directory: String,
    /// Ant-style patterns selecting sources, relative to `source_directory`.
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    /// Skip every command without doing any work.
    pub skip: bool,
    pub safe_mode: SafeMode,
    pub render: RenderConfig,
    pub renderer: RendererConfig,
    pub lint: LintConfig,
    pub validate: ValidateConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source_directory: "src/docs/asciidoc".to_string(),
            includes: vec!["**/*.adoc".to_string()],
            excludes: Vec::new(),
            skip: false,
            safe_mode: SafeMode::default(),
            render: RenderConfig::default(),
            renderer: RendererConfig::default(),
            lint: LintConfig::default(),
            validate: ValidateConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values after merging.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.includes.is_empty() {
            return Err(ConfigError::Validation("includes must not be empty".into()));
        }
        let format = &self.render.output_format;
        if format.is_empty() || format.contains(['/', '\\', '.']) {
            return Err(ConfigError::Validation(format!(
                "render.output_format must be a plain file extension, got {format:?}"
            )));
        }
        if self.render.enable_diagrams && self.render.diagram_format.is_empty() {
            return Err(ConfigError::Validation(
                "render.diagram_format must not be empty when diagrams are enabled".into(),
            ));
        }
        if self.renderer.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "renderer.program must not be empty".into(),
            ));
        }
        if self.lint.command.is_empty() {
            return Err(ConfigError::Validation("lint.command must not be empty".into()));
        }
        Ok(())
    }

    pub fn source_dir(&self) -> PathBuf {
        PathBuf::from(&self.source_directory)
    }
}

/// Security level handed to the converter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafeMode {
    Unsafe,
    #[default]
    Safe,
    Server,
    Secure,
}

impl SafeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SafeMode::Unsafe => "unsafe",
            SafeMode::Safe => "safe",
            SafeMode::Server => "server",
            SafeMode::Secure => "secure",
        }
    }
}

impl fmt::Display for SafeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Holds the hash store and diagram scratch files.
    pub work_directory: String,
    pub output_directory: String,
    /// Converter template directory (`-T`).
    pub template_dir: Option<String>,
    pub fail_on_no_files: bool,
    pub enable_diagrams: bool,
    pub diagram_format: String,
    /// Only re-render sources whose content or timestamp changed.
    pub enable_incremental: bool,
    /// Template file wrapped around each rendered document.
    pub template_file: Option<String>,
    /// Inline template; wins over `template_file` when both are set.
    pub template: Option<String>,
    /// Extension of generated files.
    pub output_format: String,
    /// Wrap output in a full HTML document when no template is configured.
    pub standalone: bool,
    /// Patterns for `render-yaml`, relative to `source_directory`.
    pub yaml_includes: Vec<String>,
    /// Attributes passed to every conversion.
    pub attributes: BTreeMap<String, String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            work_directory: "target/asciidoc-work".to_string(),
            output_directory: "target/generated-docs".to_string(),
            template_dir: None,
            fail_on_no_files: false,
            enable_diagrams: true,
            diagram_format: "svg".to_string(),
            enable_incremental: true,
            template_file: None,
            template: None,
            output_format: "html".to_string(),
            standalone: false,
            yaml_includes: vec!["**/*.yaml".to_string(), "**/*.yml".to_string()],
            attributes: BTreeMap::new(),
        }
    }
}

/// External converter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RendererConfig {
    pub program: String,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "asciidoctor".to_string(),
        }
    }
}

/// Lint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    pub rule_file: Option<String>,
    pub fail_on_error: bool,
    /// Linter argv. `{rules}` and `{file}` are substituted per run.
    pub command: Vec<String>,
    /// Also lint AsciiDoc embedded in YAML files.
    pub include_yaml: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            rule_file: None,
            fail_on_error: true,
            command: ["asciidoc-linter", "--rule", "{rules}", "--input", "{file}"]
                .map(String::from)
                .to_vec(),
            include_yaml: false,
        }
    }
}

/// JSON Schema draft used for metadata validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(alias = "v4")]
    V4,
    #[serde(alias = "v6")]
    V6,
    #[default]
    #[serde(alias = "v7")]
    V7,
    #[serde(alias = "v201909")]
    V201909,
    #[serde(alias = "v202012")]
    V202012,
}

/// Metadata validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidateConfig {
    pub schema_version: SchemaVersion,
    pub fail_on_error: bool,
    /// Stop collecting at the first unreadable document.
    pub fail_fast: bool,
    pub schema_file: Option<String>,
    pub include_attributes: bool,
    pub metadata_export_file: Option<String>,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            schema_version: SchemaVersion::default(),
            fail_on_error: true,
            fail_fast: false,
            schema_file: None,
            include_attributes: true,
            metadata_export_file: None,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(BuildConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value. `Ok(None)` when it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path` over the stock defaults.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    if overlay.is_none() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
    }
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `asciidoc.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# asciidoc-build configuration
# ============================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory searched for AsciiDoc sources.
source_directory = "src/docs/asciidoc"

# Ant-style patterns, relative to source_directory.
# `**` matches any number of directories, `*` part of a name, `?` one character.
includes = ["**/*.adoc"]
excludes = []

# Skip every command without doing any work.
skip = false

# Converter security level: unsafe | safe | server | secure
safe_mode = "safe"

# ---------------------------------------------------------------------------
# Rendering
# ---------------------------------------------------------------------------
[render]
# Holds the hash store (.asciidoc.hashes) and diagram scratch files.
work_directory = "target/asciidoc-work"
output_directory = "target/generated-docs"

# Converter template directory, passed to the converter as -T.
# template_dir = "src/docs/converter-templates"

# Fail when no source files are found.
fail_on_no_files = false

# Load the diagram extension and write diagrams into the work directory.
enable_diagrams = true
diagram_format = "svg"

# Only re-render sources whose content or timestamp changed.
enable_incremental = true

# Wrap each rendered document in a template. Variables: html, attributes,
# frontMatter, metadata. The inline template wins when both are set.
# template_file = "src/docs/templates/page.html"
# template = "<article>{{ html }}</article>"

# Extension of generated files.
output_format = "html"

# Without a template, wrap output in a full HTML document.
standalone = false

# Files processed by `render-yaml`, relative to source_directory.
yaml_includes = ["**/*.yaml", "**/*.yml"]

# Attributes passed to every conversion.
[render.attributes]
# toc = "left"

# ---------------------------------------------------------------------------
# Converter
# ---------------------------------------------------------------------------
[renderer]
program = "asciidoctor"

# ---------------------------------------------------------------------------
# Linting
# ---------------------------------------------------------------------------
[lint]
# Rule file handed to the linter. Required by the `lint` command.
# rule_file = "lint-rules.yaml"

fail_on_error = true

# Linter argv. {rules} and {file} are substituted; content arrives on stdin.
command = ["asciidoc-linter", "--rule", "{rules}", "--input", "{file}"]

# Also lint AsciiDoc embedded in YAML files (scalars tagged !asciidoc).
include_yaml = false

# ---------------------------------------------------------------------------
# Metadata validation
# ---------------------------------------------------------------------------
[validate]
# JSON Schema draft: V4 | V6 | V7 | V201909 | V202012
schema_version = "V7"
fail_on_error = true

# Stop at the first document that cannot be read.
fail_fast = false

# schema_file = "src/docs/schema.json"

# Include header attributes in each document's metadata.
include_attributes = true

# Write the collected metadata as JSON.
# metadata_export_file = "target/metadata.json"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = BuildConfig::default();
        assert_eq!(config.source_directory, "src/docs/asciidoc");
        assert_eq!(config.includes, vec!["**/*.adoc"]);
        assert_eq!(config.safe_mode, SafeMode::Safe);
        assert_eq!(config.render.output_format, "html");
        assert!(config.render.enable_incremental);
        assert_eq!(config.validate.schema_version, SchemaVersion::V7);
        assert!(config.lint.command.iter().any(|arg| arg == "{file}"));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[render]
output_format = "xml"
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.render.output_format, "xml");
        // Defaults preserved
        assert_eq!(config.render.diagram_format, "svg");
        assert_eq!(config.renderer.program, "asciidoctor");
    }

    #[test]
    fn parse_enums() {
        let toml = r#"
safe_mode = "server"

[validate]
schema_version = "V202012"
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.safe_mode, SafeMode::Server);
        assert_eq!(config.validate.schema_version, SchemaVersion::V202012);
    }

    #[test]
    fn unknown_schema_version_lists_supported() {
        let result: Result<BuildConfig, _> = toml::from_str("[validate]\nschema_version = \"V5\"\n");
        let message = result.unwrap_err().to_string();
        assert!(message.contains("V7"), "{message}");
        assert!(message.contains("V202012"), "{message}");
    }

    #[test]
    fn schema_version_accepts_lowercase() {
        let config: BuildConfig = toml::from_str("[validate]\nschema_version = \"v7\"\n").unwrap();
        assert_eq!(config.validate.schema_version, SchemaVersion::V7);
        let config: BuildConfig = toml::from_str("[validate]\nschema_version = \"v202012\"\n").unwrap();
        assert_eq!(config.validate.schema_version, SchemaVersion::V202012);
    }

    #[test]
    fn safe_mode_display() {
        assert_eq!(SafeMode::Unsafe.to_string(), "unsafe");
        assert_eq!(SafeMode::Secure.as_str(), "secure");
    }

    #[test]
    fn parse_attributes_table() {
        let toml = r#"
[render.attributes]
toc = "left"
icons = "font"
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.render.attributes.get("toc").map(String::as_str), Some("left"));
        assert_eq!(config.render.attributes.len(), 2);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
source_directory = "docs"

[lint]
rule_file = "rules.yaml"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.source_directory, "docs");
        assert_eq!(config.lint.rule_file.as_deref(), Some("rules.yaml"));
        // Unspecified values are defaults
        assert!(config.lint.fail_on_error);
        assert_eq!(config.render.output_directory, "target/generated-docs");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "this is not [valid toml").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_runs_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "[render]\noutput_format = \"../html\"\n").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let result: Result<BuildConfig, _> = toml::from_str("[render]\nouput_format = \"html\"\n");
        assert!(result.is_err());
    }

    // =========================================================================
    // validate tests
    // =========================================================================

    #[test]
    fn validate_rejects_empty_includes() {
        let config = BuildConfig {
            includes: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_lint_command() {
        let mut config = BuildConfig::default();
        config.lint.command.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_allows_empty_diagram_format_without_diagrams() {
        let mut config = BuildConfig::default();
        config.render.enable_diagrams = false;
        config.render.diagram_format.clear();
        assert!(config.validate().is_ok());
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("skip = false").unwrap();
        let overlay: toml::Value = toml::from_str("skip = true").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("skip").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_table_merge_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            "[render]\noutput_format = \"html\"\ndiagram_format = \"svg\"\n",
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[render]\ndiagram_format = \"png\"\n").unwrap();
        let merged = merge_toml(base, overlay);
        let render = merged.get("render").unwrap();
        assert_eq!(render.get("output_format").unwrap().as_str(), Some("html"));
        assert_eq!(render.get("diagram_format").unwrap().as_str(), Some("png"));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("includes = [\"a\", \"b\"]").unwrap();
        let overlay: toml::Value = toml::from_str("includes = [\"c\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("includes").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // stock config tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: BuildConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        for section in ["[render]", "[render.attributes]", "[renderer]", "[lint]", "[validate]"] {
            assert!(content.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        for key in ["render", "renderer", "lint", "validate"] {
            assert!(val.get(key).is_some(), "missing {key}");
        }
    }
}
