//! `md2docx render-diagram` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use md2docx_config::{CliSettings, Config};
use md2docx_diagrams::{DiagramFormat, DiagramLanguage, RenderError, RenderRequest};

use super::{renderer_from_config, run_cancellable};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render-diagram command.
#[derive(Args)]
pub(crate) struct RenderDiagramArgs {
    /// Diagram source file (`.mmd`, `.puml`, `.dot`, `.d2`, ...).
    input: PathBuf,

    /// Output file.
    #[arg(short, long)]
    output: PathBuf,

    /// Diagram language (default: inferred from the input extension).
    #[arg(short, long)]
    language: Option<String>,

    /// Output format (default: inferred from the output extension, else png).
    #[arg(short, long, value_parser = ["svg", "png"])]
    format: Option<String>,

    /// Kroki server URL for diagram rendering (overrides config).
    #[arg(long, env = "MD2DOCX_KROKI_URL")]
    kroki_url: Option<String>,

    /// Rasterization DPI for PNG output (overrides config).
    #[arg(long)]
    dpi: Option<u32>,

    /// Path to configuration file (default: auto-discover md2docx.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RenderDiagramArgs {
    /// Execute the render-diagram command.
    ///
    /// # Errors
    ///
    /// Returns an error if the language cannot be determined or rendering fails.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let language = resolve_language(self.language.as_deref(), &self.input)?;
        let format = resolve_format(self.format.as_deref(), &self.output);

        let cli_settings = CliSettings {
            kroki_url: self.kroki_url,
            dpi: self.dpi,
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let source = std::fs::read_to_string(&self.input).map_err(|source| CliError::Input {
            path: self.input.clone(),
            source,
        })?;
        let request = RenderRequest {
            language,
            source,
            destination: self.output,
            format,
        };
        let renderer = renderer_from_config(&config);

        output.info(&format!(
            "Rendering {} as {} via {}",
            self.input.display(),
            language.kroki_endpoint(),
            config.diagrams_resolved.kroki_url
        ));
        let rendered = run_cancellable(&output, move |cancel| renderer.render(&request, &cancel))
            .await?
            .map_err(|e| match e {
                RenderError::Cancelled => CliError::Cancelled,
                e => CliError::Render(e),
            })?;

        let strategy = rendered
            .strategy
            .map_or(String::new(), |s| format!(" [{}]", s.name()));
        output.success(&format!("Wrote {}{strategy}", rendered.path.display()));
        Ok(())
    }
}

fn resolve_language(flag: Option<&str>, input: &Path) -> Result<DiagramLanguage, CliError> {
    if let Some(name) = flag {
        return DiagramLanguage::parse(name)
            .ok_or_else(|| CliError::Validation(format!("Unknown diagram language: {name}")));
    }
    input
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(DiagramLanguage::from_extension)
        .ok_or_else(|| {
            CliError::Validation(format!(
                "Cannot infer diagram language from {}; pass --language",
                input.display()
            ))
        })
}

fn resolve_format(flag: Option<&str>, output: &Path) -> DiagramFormat {
    flag.or_else(|| output.extension().and_then(|ext| ext.to_str()))
        .and_then(DiagramFormat::parse)
        .unwrap_or_default()
}
