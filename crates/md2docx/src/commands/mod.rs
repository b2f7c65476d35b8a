//! CLI command implementations.

pub(crate) mod convert;
pub(crate) mod render_diagram;

pub(crate) use convert::ConvertArgs;
pub(crate) use render_diagram::RenderDiagramArgs;

use std::sync::Arc;

use md2docx_config::Config;
use md2docx_diagrams::{CancellationToken, DiagramRenderer, KrokiBackend};

use crate::error::CliError;
use crate::output::Output;

/// Build a Kroki-backed renderer from the resolved diagram settings.
pub(crate) fn renderer_from_config(config: &Config) -> DiagramRenderer {
    let diagrams = &config.diagrams_resolved;
    let backend = KrokiBackend::new(diagrams.kroki_url.clone()).timeout(diagrams.timeout);
    DiagramRenderer::new(Arc::new(backend))
        .timeout(diagrams.timeout)
        .dpi(diagrams.dpi)
}

/// Run blocking `job` on the tokio blocking pool, cancelling its token on Ctrl-C.
///
/// After Ctrl-C the job is still awaited so it can clean up before the
/// process exits.
pub(crate) async fn run_cancellable<T, F>(output: &Output, job: F) -> Result<T, CliError>
where
    T: Send + 'static,
    F: FnOnce(CancellationToken) -> T + Send + 'static,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let mut task = tokio::task::spawn_blocking(move || job(token));

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            output.warning("Interrupted, cancelling...");
            cancel.cancel();
            task.await
        }
    };
    joined.map_err(|e| CliError::Runtime(format!("Worker task failed: {e}")))
}
