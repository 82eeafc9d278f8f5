//! Task lifecycle engine: per-slot manager, active record, retry loop.
//!
//! ## Files & responsibilities
//! - **manager.rs**: [`TaskManager`] — per-slot state machine coordinating
//!   at-most-one active task, interrupt-vs-wait semantics, a single-slot
//!   mailbox of pending updates, and orderly teardown.
//! - **record.rs**: `ActiveTask` — the mutable handle for one in-flight
//!   task (id, cancellation token, done latch, queued flag).
//! - **runner.rs**: the retry loop — drives every attempt of one record,
//!   with cancellation-aware backoff sleeps and persistent re-execution.
//!
//! ## Wiring
//! ```text
//! ManagerPool ──► TaskManager::update(config, data)
//!                   └─► spawn run_attempts() ──► Launch::launch(ctx)
//!                          │
//!                          └─► publishes TaskStarting / TaskStopped /
//!                              TaskFailed / BackoffScheduled to the Bus
//! ```

mod manager;
mod record;
mod runner;

pub use manager::TaskManager;
