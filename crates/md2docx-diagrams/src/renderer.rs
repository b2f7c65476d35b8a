//! Diagram rendering with cancellation, timeout, and raster fallbacks.

use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crate::backend::{BackendError, DiagramBackend};
use crate::cancel::{CancellationToken, Cancelled};
use crate::consts::{DEFAULT_DPI, DEFAULT_TIMEOUT, POLL_INTERVAL, STANDARD_DPI};
use crate::language::{DiagramFormat, DiagramLanguage};
use crate::raster::{RasterStrategy, rasterize_svg};
use crate::sanitize::sanitize_svg;

/// Error from [`DiagramRenderer::render`].
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The request itself is unusable.
    #[error("invalid render request: {0}")]
    Validation(String),
    /// The diagram produced no usable output (syntax error, unrasterizable SVG).
    #[error("diagram rendering failed: {0}")]
    Rendering(String),
    /// The rendering backend could not be used.
    #[error("{0}")]
    Backend(String),
    /// The backend did not answer within the completion window.
    #[error("diagram rendering timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    /// Cancellation was observed while rendering.
    #[error("diagram rendering cancelled")]
    Cancelled,
    /// Writing the output file failed.
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<BackendError> for RenderError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NoOutput(message) => Self::Rendering(message),
            BackendError::Unavailable(message) => Self::Backend(message),
        }
    }
}

impl From<Cancelled> for RenderError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// One diagram to render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub language: DiagramLanguage,
    pub source: String,
    pub destination: PathBuf,
    pub format: DiagramFormat,
}

/// Successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    /// File the image was written to (the request's destination).
    pub path: PathBuf,
    pub format: DiagramFormat,
    /// Strategy that produced the pixels, `None` for SVG output.
    pub strategy: Option<RasterStrategy>,
}

/// Renders diagram source to SVG or PNG files through a [`DiagramBackend`].
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use md2docx_diagrams::{CancellationToken, DiagramRenderer, KrokiBackend};
///
/// let renderer = DiagramRenderer::new(Arc::new(KrokiBackend::default())).dpi(144);
/// let rendered = renderer.render(&request, &CancellationToken::new())?;
/// ```
#[derive(Clone)]
pub struct DiagramRenderer {
    backend: Arc<dyn DiagramBackend>,
    timeout: Duration,
    dpi: u32,
}

impl DiagramRenderer {
    /// Create a renderer with default timeout (30s) and DPI (192).
    #[must_use]
    pub fn new(backend: Arc<dyn DiagramBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_TIMEOUT,
            dpi: DEFAULT_DPI,
        }
    }

    /// Set the completion window for each backend call.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set DPI for PNG output (96 keeps the SVG's intrinsic size).
    #[must_use]
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Name of the configured backend.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Render one diagram to `request.destination`.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Validation`] for empty source or destination
    /// - [`RenderError::Rendering`] when the diagram produced no output or
    ///   every raster strategy failed
    /// - [`RenderError::Backend`] / [`RenderError::Timeout`] when the backend
    ///   is unusable
    /// - [`RenderError::Cancelled`] when `cancel` fired
    /// - [`RenderError::Io`] when the output file cannot be written
    pub fn render(
        &self,
        request: &RenderRequest,
        cancel: &CancellationToken,
    ) -> Result<RenderedDiagram, RenderError> {
        if request.source.trim().is_empty() {
            return Err(RenderError::Validation("diagram source is empty".to_owned()));
        }
        if request.destination.as_os_str().is_empty() {
            return Err(RenderError::Validation(
                "destination path is empty".to_owned(),
            ));
        }
        cancel.check()?;

        let language = request.language;
        let svg = {
            let backend = Arc::clone(&self.backend);
            let source = request.source.clone();
            self.wait(move || backend.render_svg(language, &source), cancel)??
        };
        cancel.check()?;

        match request.format {
            DiagramFormat::Svg => {
                write_output(&request.destination, svg.as_bytes())?;
                Ok(RenderedDiagram {
                    path: request.destination.clone(),
                    format: DiagramFormat::Svg,
                    strategy: None,
                })
            }
            DiagramFormat::Png => {
                let (png, strategy) = self.rasterize(request, &svg, cancel)?;
                write_output(&request.destination, &png)?;
                Ok(RenderedDiagram {
                    path: request.destination.clone(),
                    format: DiagramFormat::Png,
                    strategy: Some(strategy),
                })
            }
        }
    }

    /// Run the raster chain and return the first success.
    fn rasterize(
        &self,
        request: &RenderRequest,
        svg: &str,
        cancel: &CancellationToken,
    ) -> Result<(Vec<u8>, RasterStrategy), RenderError> {
        let scale = self.scale();
        let mut failures = Vec::with_capacity(RasterStrategy::CHAIN.len());

        for strategy in RasterStrategy::CHAIN {
            cancel.check()?;
            let attempt = match strategy {
                RasterStrategy::SanitizedSvg => {
                    rasterize_svg(&sanitize_svg(svg), scale).map_err(|e| e.to_string())
                }
                RasterStrategy::OriginalSvg => {
                    rasterize_svg(svg, scale).map_err(|e| e.to_string())
                }
                RasterStrategy::SurfaceCapture => {
                    let backend = Arc::clone(&self.backend);
                    let language = request.language;
                    let source = request.source.clone();
                    match self.wait(move || backend.capture_png(language, &source), cancel) {
                        Ok(result) => result.map_err(|e| e.to_string()),
                        Err(RenderError::Cancelled) => return Err(RenderError::Cancelled),
                        Err(e) => Err(e.to_string()),
                    }
                }
            };

            match attempt {
                Ok(png) => {
                    tracing::debug!(strategy = strategy.name(), bytes = png.len(), "Rasterized diagram");
                    return Ok((png, strategy));
                }
                Err(message) => {
                    tracing::debug!(strategy = strategy.name(), error = %message, "Raster strategy failed");
                    failures.push(format!("{}: {message}", strategy.name()));
                }
            }
        }

        Err(RenderError::Rendering(format!(
            "no raster strategy succeeded ({})",
            failures.join("; ")
        )))
    }

    /// Run `job` on a worker thread, polling `cancel` until it finishes or
    /// the completion window closes.
    ///
    /// An abandoned worker keeps running until its backend call returns; its
    /// result is discarded.
    fn wait<T, F>(&self, job: F, cancel: &CancellationToken) -> Result<T, RenderError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("diagram-render".to_owned())
            .spawn(move || {
                // Receiver may be gone after timeout or cancellation
                let _ = tx.send(job());
            })
            .map_err(|e| RenderError::Backend(format!("failed to spawn render worker: {e}")))?;

        let started = Instant::now();
        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(value) => return Ok(value),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(RenderError::Backend(
                        "render worker exited without a result".to_owned(),
                    ));
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }

            cancel.check()?;
            if started.elapsed() >= self.timeout {
                return Err(RenderError::Timeout(self.timeout));
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn scale(&self) -> f32 {
        self.dpi as f32 / STANDARD_DPI as f32
    }
}

fn write_output(path: &Path, data: &[u8]) -> Result<(), RenderError> {
    std::fs::write(path, data).map_err(|source| RenderError::Io {
        path: path.to_path_buf(),
        source,
    })
}
