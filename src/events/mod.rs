//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the supervisor, the
//! manager pool, task managers, and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor` (config/watcher/shutdown), `ManagerPool`
//!   (slot create/remove), `TaskManager` (update queued/dropped, teardown),
//!   the retry loop (launch lifecycle, backoff), `SubscriberSet` workers
//!   (overflow/panic).
//! - **Consumers**: the supervisor's subscriber listener, which fans out to
//!   the [`SubscriberSet`](crate::subscribers::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
