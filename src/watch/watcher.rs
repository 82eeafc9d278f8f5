//! # Watcher interface consumed by the supervisor.
//!
//! A watcher observes one configuration file and emits:
//! - [`WatchEvent::Ready`] once, after the backend has established itself;
//! - [`WatchEvent::Change`] on every modification after readiness;
//! - [`WatchEvent::Error`] on unrecoverable backend failures.
//!
//! Debouncing is the supervisor's job; a watcher reports raw changes.

use async_trait::async_trait;

/// Event emitted by a watcher backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Backend established; emitted exactly once.
    Ready,
    /// The watched file was modified (only emitted after `Ready`).
    Change,
    /// Unrecoverable backend failure.
    Error(String),
}

/// Watcher backend observing one configuration file.
///
/// Implementations feed events through [`next`](Watch::next); a closed
/// backend returns `None`.
#[async_trait]
pub trait Watch: Send + 'static {
    /// Returns the next event, or `None` once the backend is closed.
    async fn next(&mut self) -> Option<WatchEvent>;

    /// Stops the backend. Subsequent `next` calls drain buffered events
    /// and then return `None`.
    async fn close(&mut self);
}
