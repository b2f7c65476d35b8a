//! Progress reporting.

use std::fmt;

/// Pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportStage {
    Parse,
    Render,
    Resolve,
    Assemble,
    Complete,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::Render => "render",
            Self::Resolve => "resolve",
            Self::Assemble => "assemble",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportProgress {
    /// Overall completion, 0-100.
    pub percent: u8,
    pub message: String,
    pub stage: ExportStage,
}

/// Receiver of progress events.
///
/// Implemented for closures, so `&|p: &ExportProgress| println!("{}", p.message)`
/// works as a sink.
pub trait ProgressSink {
    fn report(&self, progress: &ExportProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&ExportProgress),
{
    fn report(&self, progress: &ExportProgress) {
        self(progress);
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &ExportProgress) {}
}
