//! SVG to PNG rasterization.

use std::sync::{Arc, LazyLock};

use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg;

/// Font database shared by all rasterizations in the process.
///
/// Loading system fonts is slow, so it happens once on first use.
static FONT_DB: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "Loaded system fonts");
    Arc::new(db)
});

/// Error from [`rasterize_svg`].
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    /// The markup is not SVG that `usvg` can parse.
    #[error("failed to parse SVG: {0}")]
    Parse(String),
    /// Scale is not a positive finite number.
    #[error("invalid scale factor: {0}")]
    InvalidScale(f32),
    /// Scaled dimensions are zero or too large to allocate.
    #[error("cannot allocate {width}x{height} surface")]
    Surface { width: u32, height: u32 },
    /// PNG encoding failed.
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

/// Rasterize SVG markup to RGBA PNG bytes.
///
/// `scale` multiplies the SVG's intrinsic size (`dpi / 96`). Transparent
/// areas stay transparent.
///
/// # Errors
///
/// Returns [`RasterError`] if the SVG cannot be parsed or the output surface
/// cannot be created or encoded.
pub fn rasterize_svg(svg: &str, scale: f32) -> Result<Vec<u8>, RasterError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RasterError::InvalidScale(scale));
    }

    let options = usvg::Options {
        fontdb: Arc::clone(&FONT_DB),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_str(svg, &options).map_err(|e| RasterError::Parse(e.to_string()))?;

    let size = tree.size();
    let width = scaled_dimension(size.width(), scale);
    let height = scaled_dimension(size.height(), scale);

    let mut pixmap = Pixmap::new(width, height).ok_or(RasterError::Surface { width, height })?;
    resvg::render(
        &tree,
        Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    pixmap
        .encode_png()
        .map_err(|e| RasterError::Encode(e.to_string()))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_dimension(value: f32, scale: f32) -> u32 {
    let scaled = (value * scale).ceil();
    if scaled.is_finite() && scaled >= 1.0 && scaled <= u32::MAX as f32 {
        scaled as u32
    } else {
        0
    }
}

/// One way of turning a diagram into PNG pixels.
///
/// The renderer tries these in order and keeps the first success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterStrategy {
    /// Rasterize the SVG after [`sanitize_svg`](crate::sanitize_svg).
    SanitizedSvg,
    /// Rasterize the SVG exactly as the backend returned it.
    OriginalSvg,
    /// Ask the backend for a pixel capture of the rendered diagram.
    SurfaceCapture,
}

impl RasterStrategy {
    /// Strategies in the order they are attempted.
    pub const CHAIN: [Self; 3] = [Self::SanitizedSvg, Self::OriginalSvg, Self::SurfaceCapture];

    /// Short name used in logs.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::SanitizedSvg => "sanitized-svg",
            Self::OriginalSvg => "original-svg",
            Self::SurfaceCapture => "surface-capture",
        }
    }
}
