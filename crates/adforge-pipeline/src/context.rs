//! Per-invocation context: cancellation, progress reporting, and the optional
//! lifecycle event bus.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use adforge_core::events::{EventBus, EventPayload};

use crate::run::ProgressUpdate;

/// Sender for reporting progress ticks to the caller.
///
/// Wraps a callback that receives a [`ProgressUpdate`] on every phase change
/// and every poll tick.
pub struct ProgressSender {
    callback: Box<dyn Fn(&ProgressUpdate) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(&ProgressUpdate) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sender that discards all progress reports.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    /// Report progress.
    pub fn send(&self, update: &ProgressUpdate) {
        (self.callback)(update);
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

/// Context passed to the orchestrator for one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Observed at every suspension point; once cancelled no further remote
    /// calls are issued.
    pub cancellation: CancellationToken,
    /// Channel for reporting progress to the caller.
    pub progress: Arc<ProgressSender>,
    /// Lifecycle events are published here when present.
    pub events: Option<Arc<EventBus>>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            cancellation: CancellationToken::new(),
            progress: Arc::new(ProgressSender::noop()),
            events: None,
        }
    }

    /// Builder: set the cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Builder: set the progress sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = Arc::new(progress);
        self
    }

    /// Builder: attach an event bus.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Request cooperative cancellation of the run.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub(crate) fn publish(&self, payload: EventPayload) {
        if let Some(bus) = &self.events {
            bus.broadcast(payload);
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
