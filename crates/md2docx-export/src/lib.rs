//! Markdown to `.docx` export.
//!
//! [`Exporter::export`] runs the whole pipeline for one document:
//!
//! 1. parse the markdown into an owned block tree
//! 2. render every fenced diagram block to PNG through a [`DiagramRenderer`]
//! 3. resolve image references against the source file's directory
//! 4. assemble and save the Word document
//!
//! A diagram or image that cannot be used becomes an inline error or
//! placeholder and the export still succeeds. Progress goes to a
//! [`ProgressSink`] and a shared [`CancellationToken`] stops the export at the
//! next checkpoint, leaving neither temp files nor a partial document behind.
//!
//! ```ignore
//! use std::sync::Arc;
//! use md2docx_diagrams::{CancellationToken, DiagramRenderer, KrokiBackend};
//! use md2docx_export::{ExportRequest, Exporter, NoProgress};
//!
//! let renderer = DiagramRenderer::new(Arc::new(KrokiBackend::default()));
//! let exporter = Exporter::new(renderer);
//! let request = ExportRequest::new(std::fs::read_to_string("README.md")?, "README.docx")
//!     .source_path("README.md");
//! let result = exporter.export(&request, &NoProgress, &CancellationToken::new())?;
//! ```
//!
//! [`DiagramRenderer`]: md2docx_diagrams::DiagramRenderer
//! [`CancellationToken`]: md2docx_diagrams::CancellationToken

mod assemble;
mod exporter;
mod progress;
mod records;
mod resolver;
mod result;
mod run;

pub use exporter::{ExportRequest, Exporter};
pub use progress::{ExportProgress, ExportStage, NoProgress, ProgressSink};
pub use records::{
    DiagramOutcome, DiagramRecord, ImageRecord, ImageTarget, RenderedDiagrams, ResolvedImages,
};
pub use resolver::{ImageFormat, ImagePathResolver, ImageSource, classify, detect_format};
pub use result::{ExportFailure, ExportResult, ExportStatistics, FailureKind};
pub use run::ExportRun;
