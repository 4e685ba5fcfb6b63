//! Linting AsciiDoc sources with an external linter.
//!
//! The linter is any executable that reads a document on stdin and prints
//! one finding per line with a severity marker:
//!
//! ```text
//! [ERROR] install.adoc:12: Section title must be sentence case
//! WARNING: install.adoc:30: Line exceeds 120 characters
//! ```
//!
//! Lines without a marker are ignored. The line number is the first `:N:`
//! or `:N]` in the text; findings without one are reported at line 0.

use crate::config::LintConfig;
use crate::process::{command_for, run_with_stdin};
use crate::report::{Severity, relay_to_log};
use crate::yaml::{YamlError, extract_asciidoc_file};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::LazyLock;
use thiserror::Error;

static MARKED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[\w.-]+: )?(?:\[(?:ERROR|WARN|INFO)\]|(?:ERROR|WARNING|WARN|INFO):)\s*(.*)$")
        .expect("marker pattern is valid")
});
static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":(\d+)[:\]]").expect("line pattern is valid"));

#[derive(Error, Debug)]
pub enum LintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No rule file configured (set lint.rule_file)")]
    MissingRuleFile,
    #[error("Rule file not found: {0}")]
    RuleFileNotFound(PathBuf),
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("YAML error: {0}")]
    Yaml(#[from] YamlError),
    #[error("AsciiDoc linting failed with {0} error(s)")]
    Errors(u32),
}

/// A single finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintMessage {
    pub severity: Severity,
    pub line: usize,
    pub message: String,
}

impl LintMessage {
    /// Parse a linter output line. `None` for lines without a marker.
    pub fn parse(line: &str) -> Option<Self> {
        let severity = Severity::detect(line)?;
        let message = MARKED_LINE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map_or(line, |m| m.as_str())
            .to_string();
        let line = LINE_NUMBER
            .captures(line)
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0);
        Some(Self {
            severity,
            line,
            message,
        })
    }
}

/// Checks one document against a rule file.
pub trait Linter {
    /// `file` is the document's path when it exists on disk; embedded
    /// fragments only have `content`.
    fn lint(
        &self,
        rules: &Path,
        file: Option<&Path>,
        content: &str,
    ) -> Result<Vec<LintMessage>, LintError>;
}

/// Runs a configured linter command line.
#[derive(Debug, Clone)]
pub struct CommandLinter {
    command: Vec<String>,
}

impl CommandLinter {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    /// The argv with `{rules}` and `{file}` substituted. Fragments without a
    /// file get `-`.
    pub fn argv(&self, rules: &Path, file: Option<&Path>) -> Vec<String> {
        let rules = rules.display().to_string();
        let file = file.map_or_else(|| "-".to_string(), |f| f.display().to_string());
        self.command
            .iter()
            .map(|arg| arg.replace("{rules}", &rules).replace("{file}", &file))
            .collect()
    }

    fn program(&self) -> String {
        self.command.first().cloned().unwrap_or_default()
    }
}

impl Linter for CommandLinter {
    fn lint(
        &self,
        rules: &Path,
        file: Option<&Path>,
        content: &str,
    ) -> Result<Vec<LintMessage>, LintError> {
        let argv = self.argv(rules, file);
        let spawn_error = |source| LintError::Spawn {
            program: self.program(),
            source,
        };
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| spawn_error(std::io::ErrorKind::InvalidInput.into()))?;
        let mut command = command_for(program).map_err(spawn_error)?;
        command.args(args);

        let output = run_with_stdin(&mut command, content).map_err(spawn_error)?;
        if !output.stderr.is_empty() {
            relay_to_log(&String::from_utf8_lossy(&output.stderr));
        }
        // Exit code 1 means "findings reported".
        if !matches!(output.status.code(), Some(0 | 1)) {
            return Err(LintError::Failed {
                program: self.program(),
                status: output.status,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(LintMessage::parse)
            .collect())
    }
}

/// Totals of a lint run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LintSummary {
    pub documents: u32,
    pub errors: u32,
    pub warnings: u32,
}

impl LintSummary {
    /// Fail when errors were found and the configuration says to.
    pub fn check(&self, fail_on_error: bool) -> Result<(), LintError> {
        if self.errors > 0 && fail_on_error {
            return Err(LintError::Errors(self.errors));
        }
        Ok(())
    }

    fn record(&mut self, name: &str, messages: &[LintMessage]) {
        self.documents += 1;
        if messages.is_empty() {
            return;
        }
        tracing::info!("Results for: {name}");
        for msg in messages {
            let text = format!("[{name}:{}] {}: {}", msg.line, msg.severity, msg.message);
            match msg.severity {
                Severity::Error => {
                    tracing::error!("{text}");
                    self.errors += 1;
                }
                Severity::Warn => {
                    tracing::warn!("{text}");
                    self.warnings += 1;
                }
                Severity::Info => tracing::info!("{text}"),
            }
        }
    }
}

/// Resolve and check the configured rule file.
pub fn rule_file(config: &LintConfig) -> Result<PathBuf, LintError> {
    let path = config
        .rule_file
        .as_ref()
        .map(PathBuf::from)
        .ok_or(LintError::MissingRuleFile)?;
    if !path.exists() {
        return Err(LintError::RuleFileNotFound(
            std::path::absolute(&path).unwrap_or(path),
        ));
    }
    Ok(path)
}

/// Lint AsciiDoc files, then the `!asciidoc` fragments of `yaml_files`
/// when `include_yaml` is set.
///
/// A linter failure on one document aborts the run when `fail_on_error`
/// is set and is logged otherwise. Findings never abort the run; call
/// [`LintSummary::check`] on the result.
pub fn lint_files<L: Linter>(
    linter: &L,
    config: &LintConfig,
    files: &[PathBuf],
    yaml_files: &[PathBuf],
) -> Result<LintSummary, LintError> {
    let rules = rule_file(config)?;
    tracing::info!("Found {} AsciiDoc files to lint", files.len());
    tracing::info!("Loading linter configuration from: {}", rules.display());

    let mut summary = LintSummary::default();

    for file in files {
        tracing::info!("Linting: {}", file.display());
        let result = fs::read_to_string(file)
            .map_err(LintError::from)
            .and_then(|content| linter.lint(&rules, Some(file), &content));
        match result {
            Ok(messages) => summary.record(&display_name(file), &messages),
            Err(e) => {
                tracing::error!("Error linting file {}: {e}", file.display());
                if config.fail_on_error {
                    return Err(e);
                }
            }
        }
    }

    if config.include_yaml {
        for file in yaml_files {
            let fragments = match extract_asciidoc_file(file) {
                Ok(fragments) => fragments,
                Err(e) => {
                    tracing::error!("Error reading YAML file {}: {e}", file.display());
                    if config.fail_on_error {
                        return Err(e.into());
                    }
                    continue;
                }
            };
            for fragment in fragments {
                let name = format!("{}#{}", display_name(file), fragment.path);
                tracing::info!("Linting: {name}");
                match linter.lint(&rules, None, &fragment.content) {
                    Ok(messages) => summary.record(&name, &messages),
                    Err(e) => {
                        tracing::error!("Error linting {name}: {e}");
                        if config.fail_on_error {
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    Ok(summary)
}

fn display_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}
