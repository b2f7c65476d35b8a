//! Side tables joined back to the document during assembly.
//!
//! Render outcomes are keyed by the source line of their fenced block and
//! image records by the reference exactly as written. Both are filled once
//! during their stage and only read afterwards.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use md2docx_diagrams::DiagramLanguage;

/// Result of rendering one diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagramOutcome {
    /// PNG written to this temp file.
    Rendered(PathBuf),
    /// Rendering failed with this message.
    Failed(String),
}

/// One fenced diagram block and what became of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramRecord {
    pub source: String,
    /// 1-based line of the opening fence.
    pub line: usize,
    pub language: DiagramLanguage,
    pub outcome: DiagramOutcome,
}

/// Render outcomes keyed by source line.
#[derive(Debug, Default)]
pub struct RenderedDiagrams {
    by_line: BTreeMap<usize, DiagramRecord>,
}

impl RenderedDiagrams {
    pub(crate) fn insert(&mut self, record: DiagramRecord) {
        self.by_line.insert(record.line, record);
    }

    /// Record for the diagram whose fence starts on `line`.
    #[must_use]
    pub fn get(&self, line: usize) -> Option<&DiagramRecord> {
        self.by_line.get(&line)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_line.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    /// Records in source order.
    pub fn iter(&self) -> impl Iterator<Item = &DiagramRecord> {
        self.by_line.values()
    }

    pub(crate) fn into_records(self) -> Vec<DiagramRecord> {
        self.by_line.into_values().collect()
    }
}

/// What the assembler should embed for an image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    /// Raster file on disk (original or a rasterized temp copy).
    File(PathBuf),
    /// Decoded `data:` URI payload.
    Data(Vec<u8>),
    /// Remote URL, not downloaded.
    Remote(String),
    /// Nothing usable; the reason goes into the placeholder.
    Unavailable(String),
}

/// One image reference after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    /// Reference exactly as written in the markdown.
    pub original: String,
    /// Canonical form from the resolver, when resolution applies.
    pub resolved: Option<String>,
    pub alt: String,
    /// Line of the first occurrence.
    pub line: usize,
    pub target: ImageTarget,
}

/// Image records keyed by original reference.
#[derive(Debug, Default)]
pub struct ResolvedImages {
    by_original: HashMap<String, ImageRecord>,
    order: Vec<String>,
}

impl ResolvedImages {
    pub(crate) fn insert(&mut self, record: ImageRecord) {
        if !self.by_original.contains_key(&record.original) {
            self.order.push(record.original.clone());
        }
        self.by_original.insert(record.original.clone(), record);
    }

    pub(crate) fn contains(&self, original: &str) -> bool {
        self.by_original.contains_key(original)
    }

    #[must_use]
    pub fn get(&self, original: &str) -> Option<&ImageRecord> {
        self.by_original.get(original)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn into_records(mut self) -> Vec<ImageRecord> {
        self.order
            .iter()
            .filter_map(|original| self.by_original.remove(original))
            .collect()
    }
}
