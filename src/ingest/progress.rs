//! Phase-completion notifications for long-running operations.

use std::sync::Arc;

use tracing::info;

/// Receives `step/total` notifications.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, step: usize, total: usize, message: &str);
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, step: usize, total: usize, message: &str) {
        info!("{} ({}/{})", message, step, total);
    }
}

/// Discards notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _step: usize, _total: usize, _message: &str) {}
}

/// A reporter plus this operation's position in a longer sequence.
#[derive(Clone)]
pub struct Progress {
    reporter: Arc<dyn ProgressReporter>,
    offset: usize,
    total: usize,
}

impl Progress {
    pub fn new(reporter: Arc<dyn ProgressReporter>, offset: usize, total: usize) -> Self {
        Self {
            reporter,
            offset,
            total,
        }
    }

    pub fn silent() -> Self {
        Self::new(Arc::new(NoProgress), 0, 0)
    }

    /// Report local step `n` (1-based).
    pub fn step(&self, n: usize, message: &str) {
        self.reporter.report(self.offset + n, self.total, message);
    }
}
