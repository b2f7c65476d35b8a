//! WordprocessingML (`.docx`) writer.
//!
//! [`AssemblySession`] accepts headings, paragraphs, lists, tables, code
//! blocks, quotes, and images in reading order, then writes a complete Open
//! Packaging Conventions zip with [`AssemblySession::save`].
//!
//! # Example
//!
//! ```no_run
//! use md2docx_docx::{AssemblySession, ParagraphStyle, Run};
//!
//! let mut session = AssemblySession::create("report.docx")?;
//! session.add_heading("Report", 1)?;
//! session.add_runs(&[Run::text("Hello "), Run::text("world").bold()])?;
//! session.add_paragraph("Footnote", &ParagraphStyle { italic: true, ..Default::default() })?;
//! session.save()?;
//! # Ok::<(), md2docx_docx::AssemblyError>(())
//! ```

mod error;
mod media;
mod numbering;
mod package;
mod session;
mod style;
mod xml;

pub use error::AssemblyError;
pub use session::{AssemblySession, EMU_PER_PIXEL, EmbeddedImage};
pub use style::{
    Alignment, DocumentSettings, ImageOptions, ListItem, PageSize, ParagraphStyle, Run,
};
