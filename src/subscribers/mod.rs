//! Event subscribers: trait, fan-out set, and the built-in trace writer.
//!
//! ## Contents
//! - [`Subscribe`] the extension point for custom event handlers
//! - [`SubscriberSet`] per-subscriber bounded queues + worker tasks
//! - [`TraceWriter`] default sink rendering events through `tracing`

mod log;
mod set;
mod subscriber;

pub use log::TraceWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
