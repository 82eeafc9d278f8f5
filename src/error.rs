//! # Error types used by the eirenewatch runtime and tasks.
//!
//! This module defines the error enums of the crate:
//!
//! - [`TaskError`] errors raised by individual launch executions.
//! - [`TemplateError`] invalid template configuration, caught at construction.
//! - [`RuntimeError`] errors raised by the supervision runtime itself.
//! - [`ConfigError`] failures while parsing the watched configuration file.
//!
//! [`TaskError`] provides `as_label` for logs/metrics and `is_canceled()`
//! so the retry loop can tell an aborted task from a real failure.

use thiserror::Error;

/// # Errors produced by task execution.
///
/// These represent failures of individual launch attempts driven by a
/// task manager. `Canceled` is not an error in the traditional sense:
/// it signals intentional termination and is never retried or reported
/// as a user-level failure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task observed cancellation and aborted.
    #[error("task canceled")]
    Canceled,

    /// Task execution failed; may succeed if retried.
    #[error("execution failed: {reason}")]
    Fail { reason: String },
}

impl TaskError {
    /// Builds a [`TaskError::Fail`] from anything stringly.
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Canceled => "task_canceled",
            TaskError::Fail { .. } => "task_failed",
        }
    }

    /// Indicates whether the error is a cooperative abort.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Invalid task template configuration.
///
/// Detected when a [`TemplateBuilder`](crate::TemplateBuilder) is built.
/// This is the single call site that can fail the whole system: every
/// other error is surfaced through the logger, never through call returns.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TemplateError {
    /// `persistent` implies the first event must fire a run.
    #[error("persistent templates require initial_run = true")]
    PersistentRequiresInitialRun,

    /// Retry policy fields are out of range.
    #[error("invalid retry policy: {reason}")]
    InvalidRetry { reason: String },
}

/// # Errors produced by the supervision runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The watcher backend failed before it reported readiness.
    #[error("watcher failed: {reason}")]
    Watcher { reason: String },
}

/// # Failure while parsing the watched configuration.
///
/// Returned by [`ConfigParser`](crate::ConfigParser) implementations.
/// The supervisor logs these and keeps running with the last good state.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct ConfigError {
    reason: String,
}

impl ConfigError {
    /// Creates a new parse error with the given reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns the human-readable reason.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}
