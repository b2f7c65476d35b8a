//! `md2docx convert` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use md2docx_config::{CliSettings, Config};
use md2docx_diagrams::Cancelled;
use md2docx_docx::{DocumentSettings, ImageOptions, PageSize};
use md2docx_export::{
    DiagramOutcome, ExportProgress, ExportRequest, ExportResult, Exporter, ImageTarget,
};

use super::{renderer_from_config, run_cancellable};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the convert command.
#[derive(Args)]
pub(crate) struct ConvertArgs {
    /// Markdown file to convert.
    input: PathBuf,

    /// Output document (default: input path with a `.docx` extension).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Kroki server URL for diagram rendering (overrides config).
    #[arg(long, env = "MD2DOCX_KROKI_URL")]
    kroki_url: Option<String>,

    /// Diagram rasterization DPI (overrides config).
    #[arg(long)]
    dpi: Option<u32>,

    /// Path to configuration file (default: auto-discover md2docx.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output (show per-stage logs and diagram warnings).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ConvertArgs {
    /// Execute the convert command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or input is invalid, the export
    /// fails, or it is cancelled.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            kroki_url: self.kroki_url,
            dpi: self.dpi,
            ..Default::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let markdown = std::fs::read_to_string(&self.input).map_err(|source| CliError::Input {
            path: self.input.clone(),
            source,
        })?;
        let destination = self
            .output
            .unwrap_or_else(|| default_output_path(&self.input));

        let exporter = exporter_from_config(&config)?;
        let request = ExportRequest::new(markdown, destination).source_path(self.input.clone());

        output.info(&format!(
            "Converting {} (diagrams via {})",
            self.input.display(),
            config.diagrams_resolved.kroki_url
        ));

        let outcome = run_cancellable(&output, move |cancel| {
            let output = Output::new();
            let sink = |p: &ExportProgress| output.progress(p.percent, &p.message);
            exporter.export(&request, &sink, &cancel)
        })
        .await?;

        let result = outcome.map_err(|Cancelled| CliError::Cancelled)?;
        report_result(&output, &result)
    }
}

/// `docs/guide.md` -> `docs/guide.docx`.
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("docx")
}

fn exporter_from_config(config: &Config) -> Result<Exporter, CliError> {
    let page_size = PageSize::parse(&config.document.page_size).ok_or_else(|| {
        CliError::Validation(format!(
            "Unsupported page size: {}",
            config.document.page_size
        ))
    })?;
    let document = DocumentSettings {
        page_size,
        body_font: config.document.body_font.clone(),
        font_size: config.document.font_size,
        code_font: config.document.code_font.clone(),
    };
    let image_options = ImageOptions {
        max_width: config.images.max_width,
        max_height: config.images.max_height,
        ..ImageOptions::default()
    };

    let mut exporter = Exporter::new(renderer_from_config(config))
        .image_options(image_options)
        .document_settings(document)
        .svg_dpi(config.diagrams_resolved.dpi);
    if let Some(temp_dir) = &config.export_resolved.temp_dir {
        exporter = exporter.temp_dir(temp_dir);
    }
    Ok(exporter)
}

fn report_result(output: &Output, result: &ExportResult) -> Result<(), CliError> {
    if let Some(failure) = &result.failure {
        if let Some(guidance) = &failure.guidance {
            output.info(guidance);
        }
        return Err(CliError::Export(failure.to_string()));
    }

    for diagram in &result.diagrams {
        if let DiagramOutcome::Failed(message) = &diagram.outcome {
            output.warning(&format!(
                "Warning: diagram at line {} not rendered: {message}",
                diagram.line
            ));
        }
    }
    for image in &result.images {
        match &image.target {
            ImageTarget::Remote(url) => {
                output.warning(&format!("Warning: remote image not embedded: {url}"));
            }
            ImageTarget::Unavailable(reason) => output.warning(&format!(
                "Warning: image {} at line {} not embedded: {reason}",
                image.original, image.line
            )),
            ImageTarget::File(_) | ImageTarget::Data(_) => {}
        }
    }

    let stats = &result.statistics;
    if let Some(path) = &result.output_path {
        output.success(&format!(
            "Wrote {} ({} bytes) in {:.2}s",
            path.display(),
            stats.output_bytes,
            stats.duration.as_secs_f64()
        ));
    }
    output.info(&format!(
        "{} elements, {} tables, {} diagrams ({} failed), {} images ({} failed)",
        stats.elements,
        stats.tables,
        stats.diagrams_rendered,
        stats.diagrams_failed,
        stats.images_embedded,
        stats.images_failed
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("docs/guide.md")),
            PathBuf::from("docs/guide.docx")
        );
        assert_eq!(
            default_output_path(Path::new("README")),
            PathBuf::from("README.docx")
        );
    }

    #[test]
    fn test_exporter_from_default_config() {
        assert!(exporter_from_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_exporter_rejects_unknown_page_size() {
        let mut config = Config::default();
        config.document.page_size = "tabloid".to_owned();
        let Err(err) = exporter_from_config(&config) else {
            panic!("expected an error");
        };
        assert!(err.to_string().contains("tabloid"));
    }
}
