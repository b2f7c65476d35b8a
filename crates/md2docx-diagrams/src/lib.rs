//! Diagram rendering for md2docx.
//!
//! Turns diagram source from fenced code blocks (Mermaid, `PlantUML`,
//! `GraphViz`, and the other Kroki languages) into SVG or PNG files.
//!
//! Rendering goes through a [`DiagramBackend`]; [`KrokiBackend`] is the
//! production implementation. [`DiagramRenderer`] runs each backend call on a
//! worker thread so it can honor a timeout and a [`CancellationToken`], then
//! rasterizes the SVG locally with `resvg`, falling back through
//! [`RasterStrategy::CHAIN`] when the markup is not strict SVG.
//!
//! ```ignore
//! use std::sync::Arc;
//! use md2docx_diagrams::{
//!     CancellationToken, DiagramFormat, DiagramLanguage, DiagramRenderer, KrokiBackend,
//!     RenderRequest,
//! };
//!
//! let renderer = DiagramRenderer::new(Arc::new(KrokiBackend::new("https://kroki.io")));
//! let rendered = renderer.render(
//!     &RenderRequest {
//!         language: DiagramLanguage::Mermaid,
//!         source: "graph TD; A-->B".to_owned(),
//!         destination: "diagram.png".into(),
//!         format: DiagramFormat::Png,
//!     },
//!     &CancellationToken::new(),
//! )?;
//! ```

mod backend;
mod cancel;
mod consts;
mod kroki;
mod language;
mod raster;
mod renderer;
mod sanitize;

pub use backend::{BackendError, DiagramBackend};
pub use cancel::{CancellationToken, Cancelled};
pub use consts::{DEFAULT_DPI, DEFAULT_KROKI_URL, DEFAULT_TIMEOUT, STANDARD_DPI};
pub use kroki::KrokiBackend;
pub use language::{DiagramFormat, DiagramLanguage};
pub use raster::{RasterError, RasterStrategy, rasterize_svg};
pub use renderer::{DiagramRenderer, RenderError, RenderRequest, RenderedDiagram};
pub use sanitize::sanitize_svg;
