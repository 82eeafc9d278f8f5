//! # TraceWriter — structured event logging through `tracing`.
//!
//! A subscriber that renders runtime [`Event`]s as structured `tracing`
//! records. This is the default observability sink of the CLI binary.
//!
//! ## Example output
//! ```text
//! INFO task starting slot=0 task=k3j9x2ab attempt=0
//! WARN launch failed slot=0 task=k3j9x2ab attempt=0 error="exited with status 1"
//! INFO backoff scheduled slot=0 task=k3j9x2ab delay=2s
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Renders runtime events through the `tracing` facade.
pub struct TraceWriter;

impl TraceWriter {
    /// Constructs a new [`TraceWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TraceWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscribe for TraceWriter {
    async fn on_event(&self, e: &Event) {
        let slot = e.slot.as_deref().unwrap_or("-");
        let task = e.task_id.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskStarting => {
                info!(slot, task, attempt = e.attempt, "task starting");
            }
            EventKind::TaskStopped => {
                info!(slot, task, attempt = e.attempt, "task stopped");
            }
            EventKind::TaskFailed => {
                warn!(slot, task, attempt = e.attempt, error = e.error.as_deref(), "launch failed");
            }
            EventKind::BackoffScheduled => {
                info!(slot, task, delay = ?e.delay, attempt = e.attempt, "backoff scheduled");
            }
            EventKind::UpdateQueued => {
                debug!(slot, task, "update queued behind active task");
            }
            EventKind::UpdateDropped => {
                debug!(slot, task, reason = e.error.as_deref(), "update dropped");
            }
            EventKind::SlotCreated => {
                info!(slot, "slot created");
            }
            EventKind::SlotRemoved => {
                info!(slot, "slot removed");
            }
            EventKind::ConfigLoaded => {
                info!("configuration loaded");
            }
            EventKind::ConfigInvalid => {
                warn!(error = e.error.as_deref(), "configuration invalid; keeping last state");
            }
            EventKind::WatcherFailed => {
                warn!(error = e.error.as_deref(), "watcher failed");
            }
            EventKind::ShutdownRequested => {
                info!("shutdown requested");
            }
            EventKind::TeardownFailed => {
                warn!(slot, task, error = e.error.as_deref(), "teardown hook failed");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(error = e.error.as_deref(), "subscriber diagnostic");
            }
        }
    }

    fn name(&self) -> &'static str {
        "trace-writer"
    }
}
