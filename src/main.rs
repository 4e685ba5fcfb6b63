use asciidoc_build::config::{self, BuildConfig};
use asciidoc_build::discovery::FilePatternMatcher;
use asciidoc_build::lint::{self, CommandLinter};
use asciidoc_build::render::{AsciidoctorCli, RenderPipeline};
use asciidoc_build::{output, report, validate, yaml};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "asciidoc-build")]
#[command(about = "Lint, validate, and render AsciiDoc documentation")]
#[command(long_about = "\
Lint, validate, and render AsciiDoc documentation

Sources are picked from the source directory by Ant-style patterns and
rendered into the output directory at the same relative paths:

  src/docs/asciidoc/               →  target/generated-docs/
  ├── index.adoc                   →  ├── index.html
  ├── guides/install.adoc          →  ├── guides/install.html
  └── data/product.yaml            →  └── data/product.yaml  (render-yaml)

Rendering is incremental: sources whose content hasn't changed since the
last successful render are skipped. Hashes live in the work directory.

Run 'asciidoc-build gen-config' to generate a documented asciidoc.toml.")]
#[command(version)]
struct Cli {
    /// Config file; defaults apply when it doesn't exist
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Source directory, overriding source_directory from the config
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render AsciiDoc sources to the output directory
    Render {
        /// Render every source regardless of the hash store
        #[arg(long)]
        no_incremental: bool,
    },
    /// Render !asciidoc fragments inside YAML data files
    RenderYaml,
    /// Run the configured linter over every source
    Lint,
    /// Collect document metadata and check it against a JSON Schema
    Validate,
    /// Print a stock asciidoc.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(report::supports_ansi_colors())
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Render { no_incremental } => {
            let Some(mut build) = prepare(&cli.config, cli.source)? else {
                return Ok(());
            };
            if no_incremental {
                build.render.enable_incremental = false;
            }
            let files = sources(&build)?;
            let renderer = AsciidoctorCli::new(build.renderer.program.clone());
            let summary = RenderPipeline::new(&renderer, &build).run(&files)?;
            output::print_render_summary(
                "Render",
                &summary,
                &PathBuf::from(&build.render.output_directory),
            );
        }
        Command::RenderYaml => {
            let Some(build) = prepare(&cli.config, cli.source)? else {
                return Ok(());
            };
            let files = yaml_sources(&build)?;
            tracing::info!("Found {} YAML files", files.len());
            let renderer = AsciidoctorCli::new(build.renderer.program.clone());
            let options = RenderPipeline::new(&renderer, &build).render_options()?;
            let output_dir = PathBuf::from(&build.render.output_directory);
            let summary = yaml::render_yaml_files(
                &files,
                &build.source_dir(),
                &output_dir,
                &renderer,
                &options,
            );
            output::print_render_summary("Render YAML", &summary, &output_dir);
        }
        Command::Lint => {
            let Some(build) = prepare(&cli.config, cli.source)? else {
                return Ok(());
            };
            let files = sources(&build)?;
            let yaml_files = if build.lint.include_yaml {
                yaml_sources(&build)?
            } else {
                Vec::new()
            };
            let linter = CommandLinter::new(build.lint.command.clone());
            let summary = lint::lint_files(&linter, &build.lint, &files, &yaml_files)?;
            output::print_lint_summary(&summary);
            summary.check(build.lint.fail_on_error)?;
        }
        Command::Validate => {
            let Some(build) = prepare(&cli.config, cli.source)? else {
                return Ok(());
            };
            let source_dir = build.source_dir();
            let files = sources(&build)?;
            if cli.verbose {
                output::print_sources(&files, &source_dir);
            }
            let report = validate::validate_documents(&source_dir, &files, &build.validate);
            output::print_validation_report(&report);
            report.check(build.validate.fail_on_error)?;
        }
    }

    Ok(())
}

/// Load the config and apply `--source`. `None` means there is nothing to
/// do: the build is skipped or the source directory is missing.
fn prepare(
    config_path: &Path,
    source: Option<PathBuf>,
) -> Result<Option<BuildConfig>, Box<dyn std::error::Error>> {
    let mut build = config::load_config(config_path)?;
    if let Some(source) = source {
        build.source_directory = source.display().to_string();
    }
    if build.skip {
        tracing::info!("Skipping AsciiDoc processing (skip = true)");
        return Ok(None);
    }
    let source_dir = build.source_dir();
    if !source_dir.is_dir() {
        tracing::warn!("Source directory does not exist: {}", source_dir.display());
        return Ok(None);
    }
    Ok(Some(build))
}

/// AsciiDoc sources selected by the configured patterns.
fn sources(build: &BuildConfig) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let matcher = FilePatternMatcher::new(build.source_dir(), &build.includes, &build.excludes)?;
    let files = matcher.matched_files()?;
    tracing::info!("Found {} AsciiDoc files", files.len());
    Ok(files)
}

/// YAML data files selected by `render.yaml_includes`.
fn yaml_sources(build: &BuildConfig) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    if build.render.yaml_includes.is_empty() {
        return Ok(Vec::new());
    }
    let matcher = FilePatternMatcher::new(
        build.source_dir(),
        &build.render.yaml_includes,
        &build.excludes,
    )?;
    Ok(matcher.matched_files()?)
}
