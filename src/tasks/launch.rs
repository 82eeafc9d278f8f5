//! # Launch abstraction for supervised execution.
//!
//! Defines the core [`Launch`] trait — the single dynamic-dispatch boundary
//! between the supervision runtime and user code.
//!
//! - **[`Launch`]** — trait for implementing async, cancelable task bodies
//! - **[`LaunchFn`]** — function-backed implementation wrapping closures
//! - **[`Teardown`]** / **[`TeardownFn`]** — optional cleanup counterpart
//! - **[`BoxTaskFuture`]** — type alias for boxed task futures
//!
//! ## Rules
//! - Each invocation creates a **fresh** independent future; no shared
//!   mutable state between attempts (use `Arc<...>` explicitly if needed).
//! - Bodies **must** observe `ctx.cancel` and return promptly; cancellation
//!   observed mid-run is surfaced as [`TaskError::Canceled`] so the retry
//!   loop can tell an abort from a real failure.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::error::TaskError;
use crate::tasks::context::{LaunchContext, TeardownContext};

/// Boxed future returned by [`Launch::launch`] and [`Teardown::teardown`].
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;

/// Asynchronous, cancelable task body.
///
/// A `Launch` is invoked once per attempt by the retry loop. It receives a
/// [`LaunchContext`] carrying the slot tag, task id, attempt counter, the
/// typed config/data payloads, the cancellation token, and a spawner.
pub trait Launch<C, D>: Send + Sync + 'static {
    /// Creates a new future that runs the task body until completion or
    /// cancellation.
    ///
    /// Taking `&self` means the same body is safely invoked across attempts
    /// and across managers; each call returns an independent future.
    fn launch(&self, ctx: LaunchContext<C, D>) -> BoxTaskFuture;
}

/// Optional cleanup hook invoked during manager teardown.
///
/// Runs once per manager; receives a [`TeardownContext`] with a fresh task
/// id and a spawner without a cancellation signal. Errors are logged, never
/// re-raised.
pub trait Teardown: Send + Sync + 'static {
    /// Creates a new future that runs the cleanup body.
    fn teardown(&self, ctx: TeardownContext) -> BoxTaskFuture;
}

/// Function-backed launch implementation.
///
/// Wraps a closure that *creates* a new future per attempt.
///
/// ## Example
/// ```rust
/// use eirenewatch::{LaunchContext, LaunchFn, TaskError};
///
/// let body = LaunchFn::arc(|ctx: LaunchContext<String, String>| async move {
///     if ctx.cancel.is_cancelled() {
///         return Err(TaskError::Canceled);
///     }
///     // do work with ctx.config / ctx.data...
///     Ok(())
/// });
/// ```
pub struct LaunchFn<F> {
    f: F,
}

impl<F> LaunchFn<F> {
    /// Creates a new function-backed launch body.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the body and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut, C, D> Launch<C, D> for LaunchFn<F>
where
    F: Fn(LaunchContext<C, D>) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    C: Send + Sync + 'static,
    D: Send + Sync + 'static,
{
    fn launch(&self, ctx: LaunchContext<C, D>) -> BoxTaskFuture {
        Box::pin((self.f)(ctx))
    }
}

/// Function-backed teardown implementation.
pub struct TeardownFn<F> {
    f: F,
}

impl<F> TeardownFn<F> {
    /// Creates a new function-backed teardown hook.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the hook and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Teardown for TeardownFn<F>
where
    F: Fn(TeardownContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn teardown(&self, ctx: TeardownContext) -> BoxTaskFuture {
        Box::pin((self.f)(ctx))
    }
}
