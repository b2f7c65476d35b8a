//! Per-invocation export state.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use md2docx_diagrams::{CancellationToken, Cancelled};

use crate::progress::{ExportProgress, ExportStage, ProgressSink};

/// State owned by one export call.
///
/// Every temp file handed out by [`temp_path`](Self::temp_path) is deleted
/// exactly once: by [`cleanup`](Self::cleanup) or, failing that, on drop.
pub struct ExportRun<'a> {
    temp_dir: PathBuf,
    temp_files: Vec<PathBuf>,
    progress: &'a dyn ProgressSink,
    cancel: CancellationToken,
}

impl<'a> ExportRun<'a> {
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        progress: &'a dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            temp_files: Vec::new(),
            progress,
            cancel,
        }
    }

    /// Cancellation token for this run.
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Checkpoint between units of work.
    pub fn check_cancelled(&self) -> Result<(), Cancelled> {
        self.cancel.check()
    }

    /// Emit a progress event.
    pub fn report(&self, stage: ExportStage, percent: u8, message: impl Into<String>) {
        let progress = ExportProgress {
            percent: percent.min(100),
            message: message.into(),
            stage,
        };
        tracing::debug!(stage = %progress.stage, percent = progress.percent, "{}", progress.message);
        self.progress.report(&progress);
    }

    /// Reserve a unique temp file path with the given extension.
    ///
    /// The file is not created; it is registered for cleanup whether or not
    /// anything is written to it.
    pub fn temp_path(&mut self, extension: &str) -> PathBuf {
        let name = format!("md2docx-{}.{extension}", uuid::Uuid::new_v4());
        let path = self.temp_dir.join(name);
        self.temp_files.push(path.clone());
        path
    }

    /// Temp files registered so far and not yet cleaned up.
    #[must_use]
    pub fn temp_files(&self) -> &[PathBuf] {
        &self.temp_files
    }

    /// Delete all registered temp files. Never fails; problems are logged.
    pub fn cleanup(&mut self) {
        for path in self.temp_files.drain(..) {
            remove_temp_file(&path);
        }
    }
}

impl Drop for ExportRun<'_> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_temp_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}
