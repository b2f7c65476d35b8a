//! Rendering backend abstraction.

use crate::language::DiagramLanguage;

/// Error reported by a [`DiagramBackend`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend ran but the diagram produced no output (usually a syntax error).
    #[error("diagram produced no output: {0}")]
    NoOutput(String),
    /// The backend failed for reasons unrelated to the diagram source
    /// (network, service down, unexpected response).
    #[error("rendering backend unavailable: {0}")]
    Unavailable(String),
}

/// A live rendering surface that turns diagram source into images.
///
/// Implementations must be shareable across threads: the renderer runs each
/// call on a worker thread so it can keep polling for cancellation.
pub trait DiagramBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Render `source` and return its vector description (SVG markup).
    fn render_svg(&self, language: DiagramLanguage, source: &str) -> Result<String, BackendError>;

    /// Capture the rendered diagram as PNG pixels.
    ///
    /// Used as the last resort when local SVG rasterization fails.
    fn capture_png(&self, language: DiagramLanguage, source: &str)
    -> Result<Vec<u8>, BackendError>;
}
