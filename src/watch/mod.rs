//! File watching: the interface the supervisor consumes, plus the built-in
//! polling backend.
//!
//! ## Contents
//! - [`Watch`], [`WatchEvent`] the watcher interface
//! - [`PollWatcher`] metadata-polling backend

mod poll;
mod watcher;

pub use poll::PollWatcher;
pub use watcher::{Watch, WatchEvent};
