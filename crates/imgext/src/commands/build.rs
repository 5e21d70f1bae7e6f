//! `imgext build` command implementation.

use std::path::PathBuf;

use clap::Args;
use imgext_config::{CliSettings, Config, OutputFormat};
use imgext_engine::{Application, BuildReport};
use imgext_helper::{ConversionStats, ImageExtension, add_figure_directive, add_image_directive, add_image_type};

use crate::converter::{CommandConverter, option_spec};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Path to configuration file (default: auto-discover imgext.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Documentation source directory (overrides config).
    #[arg(short, long)]
    source_dir: Option<PathBuf>,

    /// Output directory (overrides config).
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format: html or latex (overrides config).
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Rebuild every document and ignore stored build state.
    #[arg(long)]
    no_cache: bool,

    /// Enable verbose output (show conversion logs).
    #[arg(short, long)]
    pub verbose: bool,
}

impl BuildArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            source_dir: self.source_dir,
            output_dir: self.output_dir,
            format: self.format,
            cache_enabled: self.no_cache.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        let (report, stats) = run_build(&config)?;

        for warning in &report.warnings {
            output.warning(&format!("WARNING: {warning}"));
        }
        output.success(&format!(
            "Built {} document(s): {} image(s) converted, {} up to date, {} failed",
            report.updated_docs.len(),
            stats.converted,
            stats.cached,
            stats.failed
        ));
        if !report.warnings.is_empty() {
            output.info(&format!("{} warning(s)", report.warnings.len()));
        }
        Ok(())
    }
}

/// Build the project described by `config`.
fn run_build(config: &Config) -> Result<(BuildReport, ConversionStats), CliError> {
    let output = Output::new();
    let build = &config.build_resolved;
    if !build.source_dir.is_dir() {
        return Err(CliError::Validation(format!(
            "Source directory not found: {}",
            build.source_dir.display()
        )));
    }

    output.info(&format!("Source: {}", build.source_dir.display()));
    output.info(&format!("Output: {}", build.output_dir.display()));

    let mut app = Application::new(
        build.source_dir.clone(),
        build.output_dir.clone(),
        engine_format(build.format),
    )
    .with_source_suffix(&build.source_suffix);
    if !build.cache_enabled {
        app = app.without_cache();
    }

    for image_type in &config.image_types {
        add_image_type(
            &mut app,
            &image_type.name,
            image_type.extensions.as_slice(),
            CommandConverter::class(image_type),
        );
        let extra = option_spec(&image_type.options);
        add_image_directive(&mut app, &image_type.name, extra.clone());
        add_figure_directive(&mut app, &image_type.name, extra);
    }

    let report = app.build()?;
    let stats = app
        .extension::<ImageExtension>()
        .map(ImageExtension::totals)
        .unwrap_or_default();
    Ok((report, stats))
}

fn engine_format(format: OutputFormat) -> imgext_engine::OutputFormat {
    match format {
        OutputFormat::Html => imgext_engine::OutputFormat::Html,
        OutputFormat::Latex => imgext_engine::OutputFormat::Latex,
    }
}
