//! Where recovered panics are reported.

use tracing::error;

/// Receives one already-formatted message per recovered panic.
///
/// Any `Fn(&str)` closure is a logger, which keeps tests short:
///
/// ```rust
/// use std::sync::Arc;
/// use hitch::Logger;
///
/// let logger: Arc<dyn Logger> = Arc::new(|msg: &str| eprintln!("panic: {msg}"));
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Forwards messages to `tracing` at `ERROR` level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        error!(panic = %message, "recovered from panic");
    }
}
