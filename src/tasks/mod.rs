//! Task model: templates, launch bodies, contexts, and retry policy.
//!
//! ## Contents
//! - [`TaskTemplate`], [`TemplateBuilder`] immutable task description
//! - [`Launch`], [`LaunchFn`], [`Teardown`], [`TeardownFn`] the user-code boundary
//! - [`LaunchContext`], [`TeardownContext`] per-invocation contexts
//! - [`RetryPolicy`] bounded backoff parameters
//!
//! ## Rules
//! - Templates are immutable and shared by reference across a pool.
//! - `launch` is the single dynamic-dispatch boundary of the runtime.

mod context;
mod launch;
mod retry;
mod template;

pub use context::{LaunchContext, TeardownContext};
pub use launch::{BoxTaskFuture, Launch, LaunchFn, Teardown, TeardownFn};
pub use retry::RetryPolicy;
pub use template::{TaskTemplate, TemplateBuilder};
