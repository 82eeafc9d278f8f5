//! # Active task record: handle for one in-flight execution.
//!
//! [`ActiveTask`] is created inside `update` and dies when its retry loop
//! returns (success, retries exhausted, or cancellation). It carries:
//! - the short task id (stable across the record's retries),
//! - the per-task cancellation token (chained to the template's parent),
//! - a `done` latch that resolves when the retry loop returns,
//! - the single-slot `queued` flag.
//!
//! ## Rules
//! - `queued` admits **at most one** waiter: `try_enqueue` atomically swaps
//!   the flag, so later updaters observe `false` and back off.
//! - The owning manager clears its `active` pointer **before** the `done`
//!   latch resolves, preserving `active.is_some() ⇒ done unresolved`.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Mutable handle for one in-flight task, owned by its manager.
pub(crate) struct ActiveTask {
    /// Short unique id, assigned at creation; retries reuse it.
    id: String,
    /// Per-task cancellation handle, chained to the template's parent.
    cancel: CancellationToken,
    /// Resolves to `true` when the retry loop returns.
    done: watch::Receiver<bool>,
    /// True iff one pending updater is already waiting on `done`.
    queued: AtomicBool,
}

impl ActiveTask {
    pub(crate) fn new(
        id: String,
        cancel: CancellationToken,
        done: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            cancel,
            done,
            queued: AtomicBool::new(false),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    /// Signals the record's cancellation token.
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
    }

    /// Attempts to become the single queued updater.
    ///
    /// Returns `true` if the caller won the slot; `false` if another
    /// updater is already waiting.
    pub(crate) fn try_enqueue(&self) -> bool {
        !self.queued.swap(true, Ordering::AcqRel)
    }

    /// Waits until the retry loop has returned.
    ///
    /// A closed latch (sender dropped without sending) counts as done.
    pub(crate) async fn wait_done(&self) {
        let mut rx = self.done.clone();
        let _ = rx.wait_for(|done| *done).await;
    }
}
