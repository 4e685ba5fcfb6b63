//! Render pipeline: AsciiDoc sources to output files.
//!
//! ```text
//! discovered files ──► IncrementalCache::needs_regeneration ──► skip
//!                                   │ yes
//!                                   ▼
//!                      Renderer::convert (asciidoctor)
//!                                   │
//!                      metadata + PageTemplate::apply
//!                                   │
//!                      write output ──► record_hash
//!
//! after the loop: prune(all discovered files) ──► save
//! ```
//!
//! A failure on one file is logged and counted; it doesn't stop the run and
//! its hash isn't recorded, so the next run retries it.

use crate::cache::IncrementalCache;
use crate::config::{BuildConfig, SafeMode};
use crate::discovery::DiscoveryError;
use crate::metadata::collect_document_metadata;
use crate::process::{command_for, run_with_stdin};
use crate::report::relay_to_log;
use crate::template::{DocumentContext, PageTemplate, TemplateError, TemplateProcessor};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },
    #[error("Converter returned empty output")]
    EmptyOutput,
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("No AsciiDoc files found matching the pattern")]
    NoFiles,
}

/// Options for a single conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    pub safe_mode: SafeMode,
    pub attributes: BTreeMap<String, String>,
    /// Converter template directory (`-T`).
    pub template_dir: Option<PathBuf>,
    /// Load the diagram extension.
    pub diagrams: bool,
}

/// Converts AsciiDoc text into an HTML fragment.
pub trait Renderer {
    fn convert(&self, content: &str, options: &RenderOptions) -> Result<String, RenderError>;
}

/// The `asciidoctor` command line converter.
#[derive(Debug, Clone)]
pub struct AsciidoctorCli {
    program: String,
}

impl AsciidoctorCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments after the program, ending with `-` to read stdin.
    pub fn arguments(options: &RenderOptions) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-e".into(),
            "-o".into(),
            "-".into(),
            "-S".into(),
            options.safe_mode.to_string(),
        ];
        if options.diagrams {
            args.extend(["-r".into(), "asciidoctor-diagram".into()]);
        }
        if let Some(dir) = &options.template_dir {
            args.extend(["-T".into(), dir.display().to_string()]);
        }
        for (key, value) in &options.attributes {
            args.push("-a".into());
            args.push(if value.is_empty() {
                key.clone()
            } else {
                format!("{key}={value}")
            });
        }
        args.extend(["-a".into(), "skip-front-matter".into(), "-".into()]);
        args
    }
}

impl Renderer for AsciidoctorCli {
    fn convert(&self, content: &str, options: &RenderOptions) -> Result<String, RenderError> {
        let spawn_error = |source| RenderError::Spawn {
            program: self.program.clone(),
            source,
        };
        let mut command = command_for(&self.program).map_err(spawn_error)?;
        command.args(Self::arguments(options));

        let output = run_with_stdin(&mut command, content).map_err(spawn_error)?;
        if !output.stderr.is_empty() {
            relay_to_log(&String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            return Err(RenderError::Failed {
                program: self.program.clone(),
                status: output.status,
            });
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();
        if html.trim().is_empty() {
            return Err(RenderError::EmptyOutput);
        }
        Ok(html)
    }
}

/// Outcome of a render run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    pub generated: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl RenderSummary {
    pub fn total(&self) -> u32 {
        self.generated + self.skipped + self.failed
    }
}

impl fmt::Display for RenderSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} generated", self.generated)?;
        if self.skipped > 0 {
            write!(f, ", {} unchanged", self.skipped)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.skipped > 0 || self.failed > 0 {
            write!(f, " ({} total)", self.total())?;
        }
        Ok(())
    }
}

/// Where a source file's output goes: its path relative to `source_dir`
/// under `output_dir`, with the extension replaced by `format`.
pub fn output_path(source_dir: &Path, output_dir: &Path, file: &Path, format: &str) -> PathBuf {
    let relative = match file.strip_prefix(source_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => PathBuf::from(file.file_name().unwrap_or(file.as_os_str())),
    };
    output_dir.join(relative).with_extension(format)
}

/// Drives a render run over discovered files.
pub struct RenderPipeline<'a, R: Renderer> {
    renderer: &'a R,
    config: &'a BuildConfig,
}

impl<'a, R: Renderer> RenderPipeline<'a, R> {
    pub fn new(renderer: &'a R, config: &'a BuildConfig) -> Self {
        Self { renderer, config }
    }

    fn source_dir(&self) -> PathBuf {
        self.config.source_dir()
    }

    fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.render.output_directory)
    }

    fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.render.work_directory)
    }

    /// Conversion options: configured attributes plus diagram settings that
    /// keep generated images inside the work directory.
    pub fn render_options(&self) -> Result<RenderOptions, RenderError> {
        let render = &self.config.render;
        let mut attributes = render.attributes.clone();

        if render.enable_diagrams {
            let work = std::path::absolute(self.work_dir())?;
            let images = work.join("images");
            fs::create_dir_all(&images)?;
            attributes.insert("diagram-format".into(), render.diagram_format.clone());
            attributes.insert("imagesoutdir".into(), images.display().to_string());
            attributes.insert(
                "diagram-cachedir".into(),
                work.join("diagram-cache").display().to_string(),
            );
        }

        let template_dir = render
            .template_dir
            .as_ref()
            .map(PathBuf::from)
            .filter(|dir| dir.exists());

        Ok(RenderOptions {
            safe_mode: self.config.safe_mode,
            attributes,
            template_dir,
            diagrams: render.enable_diagrams,
        })
    }

    /// Render every file that needs it. `files` must be the complete set
    /// of sources; cache entries for anything else are pruned.
    pub fn run(&self, files: &[PathBuf]) -> Result<RenderSummary, RenderError> {
        let render = &self.config.render;
        if files.is_empty() && render.fail_on_no_files {
            return Err(RenderError::NoFiles);
        }

        fs::create_dir_all(self.output_dir())?;
        fs::create_dir_all(self.work_dir())?;

        if render.enable_diagrams {
            tracing::info!("Diagram support enabled (format: {})", render.diagram_format);
        }
        let options = self.render_options()?;

        let mut cache = render.enable_incremental.then(|| {
            tracing::info!("Incremental build enabled");
            IncrementalCache::open(&self.work_dir())
        });

        let template = PageTemplate::from_config(render);
        let processor = TemplateProcessor::new();
        let source_dir = self.source_dir();
        let output_dir = self.output_dir();
        let mut summary = RenderSummary::default();

        for file in files {
            let output = output_path(&source_dir, &output_dir, file, &render.output_format);

            if let Some(cache) = &cache
                && !cache.needs_regeneration(file, &output)
            {
                tracing::debug!("Skipping unchanged file: {}", file.display());
                summary.skipped += 1;
                continue;
            }

            match self.render_file(file, &output, &options, &template, &processor) {
                Ok(()) => {
                    summary.generated += 1;
                    if let Some(cache) = &mut cache {
                        cache.record_hash(file);
                    }
                }
                Err(e) => {
                    tracing::error!("Error processing file {}: {e}", file.display());
                    summary.failed += 1;
                }
            }
        }

        if let Some(cache) = &mut cache {
            cache.prune(files);
            cache.save();
            if summary.skipped > 0 {
                tracing::info!("Skipped {} unchanged files", summary.skipped);
            }
        }

        Ok(summary)
    }

    fn render_file(
        &self,
        file: &Path,
        output: &Path,
        options: &RenderOptions,
        template: &PageTemplate,
        processor: &TemplateProcessor,
    ) -> Result<(), RenderError> {
        tracing::info!("Processing: {}", file.display());

        let content = fs::read_to_string(file)?;
        let html = self.renderer.convert(&content, options)?;

        let info = collect_document_metadata(&self.source_dir(), file, &options.attributes)?;
        let context = DocumentContext {
            html,
            attributes: info.attributes.clone(),
            front_matter: info.front_matter.clone().unwrap_or_default(),
            metadata: info.to_metadata(true),
        };
        let page = template.apply(processor, &context)?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, page)?;
        tracing::info!("Generated: {}", output.display());
        Ok(())
    }
}
