//! # eirenewatch
//!
//! **eirenewatch** is a configuration-driven task supervisor.
//!
//! It watches a configuration file on disk, parses it into a typed
//! configuration, derives a vector of per-slot data items, and keeps a
//! pool of long-running task managers in sync with that vector: one
//! manager per slot index, each driving a user-supplied asynchronous task
//! through a lifecycle of initial run, re-evaluation on change, retry,
//! interruption, persistence, and teardown.
//!
//! ## Features
//!
//! | Area              | Description                                                            | Key types / traits                          |
//! |-------------------|------------------------------------------------------------------------|---------------------------------------------|
//! | **Templates**     | Describe a task: launch body, retry policy, behavior flags.            | [`TaskTemplate`], [`TemplateBuilder`]       |
//! | **Managers**      | Per-slot lifecycle: at-most-one active task, single-slot mailbox.      | [`TaskManager`]                             |
//! | **Pool**          | Index-keyed reconciliation of managers against the data vector.        | [`ManagerPool`]                             |
//! | **Supervision**   | Watcher → debounce → parse → trigger glue, graceful shutdown.          | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Watching**      | Watcher interface plus the built-in polling backend.                   | [`Watch`], [`PollWatcher`]                  |
//! | **Spawning**      | Command execution bound to task id, cancellation, cwd, throttle.       | [`Spawner`], [`OutputThrottle`]             |
//! | **Events**        | Lifecycle events fanned out to subscribers.                            | [`Event`], [`Bus`], [`Subscribe`]           |
//! | **Errors**        | Typed errors for tasks, templates, and the runtime.                    | [`TaskError`], [`TemplateError`]            |
//!
//! ```no_run
//! use std::sync::Arc;
//! use eirenewatch::{
//!     Config, ManifestParser, PollWatcher, SupervisorBuilder, TemplateBuilder,
//!     TraceWriter, command_launch,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let supervisor = SupervisorBuilder::new(Config::default())
//!         .with_subscribers(vec![Arc::new(TraceWriter::new())])
//!         .build(
//!             "eirenewatch.json",
//!             ManifestParser,
//!             TemplateBuilder::new("manifest"),
//!             command_launch(),
//!         )?;
//!
//!     let watcher = PollWatcher::new("eirenewatch.json");
//!     supervisor.run(watcher).await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod error;
mod events;
mod ids;
mod manager;
pub mod manifest;
mod pool;
mod shutdown;
mod spawn;
mod subscribers;
mod supervisor;
mod tasks;
mod watch;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{ConfigError, RuntimeError, TaskError, TemplateError};
pub use events::{Bus, Event, EventKind};
pub use manager::TaskManager;
pub use manifest::{Manifest, ManifestParser, TaskEntry, command_launch};
pub use pool::ManagerPool;
pub use spawn::{OutputThrottle, Spawner};
pub use subscribers::{Subscribe, SubscriberSet, TraceWriter};
pub use supervisor::{ConfigParser, Supervisor, SupervisorBuilder};
pub use tasks::{
    BoxTaskFuture, Launch, LaunchContext, LaunchFn, RetryPolicy, TaskTemplate, Teardown,
    TeardownContext, TeardownFn, TemplateBuilder,
};
pub use watch::{PollWatcher, Watch, WatchEvent};
