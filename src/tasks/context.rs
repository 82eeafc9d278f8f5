//! # Execution contexts handed to user task bodies.
//!
//! [`LaunchContext`] is built fresh per launch attempt; [`TeardownContext`]
//! once per manager teardown. Both carry a [`Spawner`] for running child
//! commands bound to the task's identity and output throttle.

use tokio_util::sync::CancellationToken;

use crate::spawn::Spawner;

/// Context passed to [`Launch::launch`](crate::Launch::launch).
///
/// `task_id` is stable across the retries of one active record; a fresh id
/// is generated once per update cycle. `attempt` is `0` on the first try.
/// `first` is true iff this record was started by the very first event the
/// manager processed.
pub struct LaunchContext<C, D> {
    /// Slot tag of the owning manager (the slot index as a string).
    pub entry_id: String,
    /// Short id of the active record; retries reuse it.
    pub task_id: String,
    /// Attempt counter, `0` on the first try.
    pub attempt: u32,
    /// True iff this is the very first event processed by this manager.
    pub first: bool,
    /// The user's typed configuration payload.
    pub config: C,
    /// The user's typed per-slot data payload.
    pub data: D,
    /// Cancellation signal; chained to the supervisor's root signal.
    pub cancel: CancellationToken,
    /// Command-execution helper bound to `task_id`, `cancel`, the template
    /// working directory, and the template output throttle.
    pub spawn: Spawner,
}

/// Context passed to [`Teardown::teardown`](crate::Teardown::teardown).
///
/// Carries a fresh task id and a spawner without a cancellation signal:
/// cleanup must be allowed to finish even while the process shuts down.
pub struct TeardownContext {
    /// Fresh short id for the teardown run.
    pub task_id: String,
    /// Command-execution helper bound to `task_id` and the template output
    /// throttle.
    pub spawn: Spawner,
}
