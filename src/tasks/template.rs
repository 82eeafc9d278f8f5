//! # Task template: immutable description of a supervised task.
//!
//! [`TaskTemplate`] bundles everything the runtime needs to drive one kind
//! of task: the launch body, an optional teardown hook, the retry policy,
//! the behavior flags, and the inherited cancellation signal. One template
//! is shared by reference across all managers of a pool.
//!
//! A template is created through [`TemplateBuilder`] (fluent API).
//! `build()` is the single call site that can fail the whole system:
//! - `persistent` without `initial_run` is a configuration error;
//! - an out-of-range [`RetryPolicy`] is a configuration error.
//!
//! ## Flags
//! - `initial_run` (default true): the first event fires a run.
//! - `interruptible` (default true): a new event cancels the in-flight
//!   task; otherwise the new event waits for it to drain.
//! - `persistent` (default false): after the launch returns (success or
//!   failure), re-launch immediately, forever, until cancelled.

use std::borrow::Cow;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::TemplateError;
use crate::ids;
use crate::spawn::OutputThrottle;
use crate::tasks::launch::{Launch, LaunchFn, Teardown};
use crate::tasks::retry::RetryPolicy;

/// Immutable description of a supervised task.
///
/// Once constructed, a template is never mutated; it is shared via `Arc`
/// across all managers in a pool.
pub struct TaskTemplate<C, D> {
    name: Cow<'static, str>,
    id: String,
    launch: Arc<dyn Launch<C, D>>,
    teardown: Option<Arc<dyn Teardown>>,
    parent_cancel: CancellationToken,
    cwd: Option<PathBuf>,
    throttle: OutputThrottle,
    retry: RetryPolicy,
    initial_run: bool,
    interruptible: bool,
    persistent: bool,
}

impl<C, D> TaskTemplate<C, D> {
    /// Returns the human-readable label (used only in logs).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stable identifier of this template instance.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the launch body.
    pub fn launch(&self) -> &Arc<dyn Launch<C, D>> {
        &self.launch
    }

    /// Returns the optional teardown hook.
    pub fn teardown(&self) -> Option<&Arc<dyn Teardown>> {
        self.teardown.as_ref()
    }

    /// Returns the inherited cancellation signal.
    pub fn parent_cancel(&self) -> &CancellationToken {
        &self.parent_cancel
    }

    /// Returns the working directory for spawned commands.
    pub fn cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    /// Returns the output throttle passed to spawners.
    pub fn throttle(&self) -> OutputThrottle {
        self.throttle
    }

    /// Returns the retry policy.
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns whether the first event fires a run.
    pub fn initial_run(&self) -> bool {
        self.initial_run
    }

    /// Returns whether a new event cancels the in-flight task.
    pub fn interruptible(&self) -> bool {
        self.interruptible
    }

    /// Returns whether the task is re-launched forever until cancelled.
    pub fn persistent(&self) -> bool {
        self.persistent
    }
}

/// Builder for [`TaskTemplate`] with a fluent API.
///
/// ## Example
/// ```rust
/// use eirenewatch::{LaunchContext, TemplateBuilder};
///
/// let template = TemplateBuilder::new("build")
///     .interruptible(true)
///     .build_fn(|_ctx: LaunchContext<String, String>| async move { Ok(()) })
///     .unwrap();
/// assert_eq!(template.name(), "build");
/// ```
pub struct TemplateBuilder {
    name: Cow<'static, str>,
    parent_cancel: CancellationToken,
    teardown: Option<Arc<dyn Teardown>>,
    cwd: Option<PathBuf>,
    throttle: OutputThrottle,
    retry: RetryPolicy,
    initial_run: bool,
    interruptible: bool,
    persistent: bool,
}

impl TemplateBuilder {
    /// Creates a new builder with the given task name and default policy.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            parent_cancel: CancellationToken::new(),
            teardown: None,
            cwd: None,
            throttle: OutputThrottle::default(),
            retry: RetryPolicy::default(),
            initial_run: true,
            interruptible: true,
            persistent: false,
        }
    }

    /// Inherits the cancellation signal from the supervisor; when it fires,
    /// every task spawned by this template is cancelled.
    pub fn with_parent_cancel(mut self, token: CancellationToken) -> Self {
        self.parent_cancel = token;
        self
    }

    /// Sets the teardown hook.
    pub fn with_teardown(mut self, hook: Arc<dyn Teardown>) -> Self {
        self.teardown = Some(hook);
        self
    }

    /// Sets the working directory for spawned commands.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Sets the output throttle for spawned commands.
    pub fn with_throttle(mut self, throttle: OutputThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets whether the first event fires a run.
    pub fn initial_run(mut self, v: bool) -> Self {
        self.initial_run = v;
        self
    }

    /// Sets whether a new event cancels the in-flight task.
    pub fn interruptible(mut self, v: bool) -> Self {
        self.interruptible = v;
        self
    }

    /// Sets whether the task re-launches forever until cancelled.
    pub fn persistent(mut self, v: bool) -> Self {
        self.persistent = v;
        self
    }

    /// Builds the template around the given launch body.
    ///
    /// Validates the flag combination and retry policy; this is the only
    /// call site that surfaces a configuration error to the caller.
    pub fn build<C, D>(
        self,
        launch: Arc<dyn Launch<C, D>>,
    ) -> Result<TaskTemplate<C, D>, TemplateError> {
        if self.persistent && !self.initial_run {
            return Err(TemplateError::PersistentRequiresInitialRun);
        }
        self.retry.validate()?;

        Ok(TaskTemplate {
            name: self.name,
            id: ids::short_id(),
            launch,
            teardown: self.teardown,
            parent_cancel: self.parent_cancel,
            cwd: self.cwd,
            throttle: self.throttle,
            retry: self.retry,
            initial_run: self.initial_run,
            interruptible: self.interruptible,
            persistent: self.persistent,
        })
    }

    /// Builds the template from a closure.
    pub fn build_fn<F, Fut, C, D>(self, f: F) -> Result<TaskTemplate<C, D>, TemplateError>
    where
        F: Fn(crate::tasks::context::LaunchContext<C, D>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), crate::error::TaskError>> + Send + 'static,
        C: Send + Sync + 'static,
        D: Send + Sync + 'static,
    {
        self.build(LaunchFn::arc(f))
    }
}
