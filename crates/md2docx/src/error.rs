//! CLI error types.

use std::path::PathBuf;

use md2docx_config::ConfigError;
use md2docx_diagrams::RenderError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to read {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Render(#[from] RenderError),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Runtime(String),

    #[error("{0}")]
    Validation(String),
}
