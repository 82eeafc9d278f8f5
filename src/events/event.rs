//! # Runtime events emitted by the supervisor, pool, and task managers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: launch execution flow (starting, stopped, failed, backoff)
//! - **Slot events**: pool reconciliation (slot created, slot removed)
//! - **Update events**: manager mailbox decisions (queued, dropped)
//! - **Supervisor events**: config loading, watcher failures, shutdown
//!
//! The [`Event`] struct carries additional metadata such as timestamps,
//! slot tags, task ids, error messages, and backoff delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. This guarantees that events can be ordered correctly even
//! when delivered out-of-order through async channels.
//!
//! ## Event flow examples
//!
//! ### Initial run
//! ```text
//! watcher ready → ConfigLoaded → SlotCreated("0") → TaskStarting → TaskStopped
//! ```
//!
//! ### Interrupt-and-replace
//! ```text
//! change → ConfigLoaded → UpdateQueued → TaskStopped (canceled)
//!        → TaskStarting (new record)
//! ```
//!
//! ### Retry exhaustion
//! ```text
//! TaskStarting → TaskFailed → BackoffScheduled → TaskStarting → ... → TaskFailed
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    SubscriberPanicked,
    /// Subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,

    // === Supervisor events ===
    /// Shutdown requested (OS signal, watcher failure, or explicit cancel).
    ShutdownRequested,
    /// Configuration file was read, parsed, and the pool was triggered.
    ConfigLoaded,
    /// Configuration file could not be read or parsed; last state kept.
    ConfigInvalid,
    /// Watcher backend reported an unrecoverable failure after readiness.
    WatcherFailed,

    // === Slot events ===
    /// A new slot appeared in the data vector; a manager was created.
    SlotCreated,
    /// A slot disappeared; its manager was torn down and removed.
    SlotRemoved,

    // === Update events ===
    /// An updater parked behind the active task (single-slot mailbox).
    UpdateQueued,
    /// An update was intentionally dropped (mailbox full, or persistent
    /// non-interruptible task).
    UpdateDropped,

    // === Launch lifecycle events ===
    /// A launch attempt is starting.
    TaskStarting,
    /// The launch returned (success or graceful cancellation).
    TaskStopped,
    /// The launch failed with an error.
    TaskFailed,
    /// A retry is scheduled after a backoff delay.
    BackoffScheduled,

    // === Teardown events ===
    /// The template teardown hook raised an error (logged, never re-raised).
    TeardownFailed,
}

/// Runtime event with optional metadata.
///
/// Carries information about launch lifecycle, retries, errors, backoff
/// delays, and timing.
///
/// ## Fields
///
/// - `seq`: Unique sequence number for ordering (monotonically increasing)
/// - `at`: Wall-clock timestamp (may go backwards due to NTP, use for logging only)
/// - `kind`: Event classification
/// - `slot`, `task_id`, `attempt`, `delay`, `error`: Optional metadata
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Slot tag (the manager's entry id), if applicable.
    pub slot: Option<String>,
    /// Short task id of the active record, if applicable.
    pub task_id: Option<String>,
    /// Attempt counter (0 on the first try).
    pub attempt: Option<u32>,
    /// Backoff delay before retry (if relevant).
    pub delay: Option<Duration>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp
    /// and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            slot: None,
            task_id: None,
            attempt: None,
            delay: None,
            error: None,
        }
    }

    /// Attaches a slot tag.
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    /// Attaches a task id.
    pub fn with_task_id(mut self, id: impl Into<String>) -> Self {
        self.task_id = Some(id.into());
        self
    }

    /// Attaches an attempt counter.
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Creates a subscriber overflow event.
    ///
    /// Emitted when a subscriber's queue is full and an event is dropped.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_error(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    ///
    /// Emitted when a subscriber panics during event processing.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_slot(subscriber)
            .with_error(info)
    }

    /// Returns true for internal overflow diagnostics.
    pub(crate) fn is_subscriber_overflow(&self) -> bool {
        self.kind == EventKind::SubscriberOverflow
    }

    /// Returns true for internal panic diagnostics.
    pub(crate) fn is_subscriber_panic(&self) -> bool {
        self.kind == EventKind::SubscriberPanicked
    }
}
