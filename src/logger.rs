use std::sync::Arc;

/// Sink for the request / storage events the pipeline reports.
/// Components receive one at construction instead of reaching for a global.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Discards everything. Default for components built without a logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Forwards to the `tracing` macros under the `urlfetch` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "urlfetch", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "urlfetch", "{}", message);
    }
}

pub fn noop() -> Arc<dyn Logger> {
    Arc::new(NoopLogger)
}
