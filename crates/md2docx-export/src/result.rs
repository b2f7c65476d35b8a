//! Export outcome types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::records::{DiagramRecord, ImageRecord};

/// Category of a failed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Empty markdown or destination.
    Validation,
    /// Destination or temp directory not writable.
    Permission,
    /// Other filesystem error.
    Io,
    /// No space left on the destination device.
    DiskFull,
    /// Markdown could not be parsed.
    Parse,
    /// Document package could not be built.
    Assembly,
    /// Anything not classified above.
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation error",
            Self::Permission => "permission denied",
            Self::Io => "I/O error",
            Self::DiskFull => "disk full",
            Self::Parse => "parse error",
            Self::Assembly => "assembly error",
            Self::Unexpected => "unexpected error",
        };
        f.write_str(name)
    }
}

/// Why an export failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Hint for fixing the problem, when there is one.
    pub guidance: Option<String>,
}

impl ExportFailure {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            guidance: None,
        }
    }

    pub(crate) fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }
}

impl fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Counters collected during an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStatistics {
    /// Block elements written to the document.
    pub elements: usize,
    pub tables: usize,
    pub diagrams_rendered: usize,
    pub diagrams_failed: usize,
    pub images_embedded: usize,
    pub images_failed: usize,
    /// Size of the written document in bytes.
    pub output_bytes: u64,
    pub duration: Duration,
}

/// Outcome of [`Exporter::export`](crate::Exporter::export).
///
/// `success` is false only for validation, setup, parse, and save failures.
/// Individual diagrams or images that could not be used are reported through
/// the statistics and records while `success` stays true.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub success: bool,
    /// Written document, on success.
    pub output_path: Option<PathBuf>,
    pub failure: Option<ExportFailure>,
    pub statistics: ExportStatistics,
    pub diagrams: Vec<DiagramRecord>,
    pub images: Vec<ImageRecord>,
}

impl ExportResult {
    pub(crate) fn failed(failure: ExportFailure, duration: Duration) -> Self {
        Self {
            success: false,
            output_path: None,
            failure: Some(failure),
            statistics: ExportStatistics {
                duration,
                ..ExportStatistics::default()
            },
            diagrams: Vec::new(),
            images: Vec::new(),
        }
    }
}
