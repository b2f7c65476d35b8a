//! Markdown block tree for the docx exporter.
//!
//! This crate wraps [`pulldown_cmark`] and turns its event stream into an owned
//! tree of [`Block`]s and [`Inline`]s. Every block remembers the 1-based line
//! it starts on, which is the key later stages use to join rendered diagrams
//! back into the document.
//!
//! # Example
//!
//! ```
//! use md2docx_document::{Block, parse_document};
//!
//! let doc = parse_document("# Title\n\nSome *x* text.").unwrap();
//! assert_eq!(doc.blocks.len(), 2);
//! assert!(matches!(doc.blocks[0], Block::Heading { level: 1, line: 1, .. }));
//! ```

mod fence;
mod lines;
mod model;
mod parser;
mod util;

pub use fence::parse_fence_info;
pub use lines::LineIndex;
pub use model::{Block, Descendants, ImageRef, Inline, ListItem, ParsedDocument, plain_text};
pub use parser::{ParseError, parse_document, parser_options};
