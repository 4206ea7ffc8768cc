use tracing::info;

/// One-way diagnostic channel handed to the flow controller.
///
/// Implementations must not block and must not fail the flow.
pub trait DiagnosticSink: Send + Sync {
    fn info(&self, message: &str);
}

/// Forwards diagnostics to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn info(&self, message: &str) {
        info!(target: "sessiongate::diagnostics", "{}", message);
    }
}
