//! # TaskManager: per-slot state machine.
//!
//! Owns at most one [`ActiveTask`] for a given slot, serializes updates
//! through a single-slot mailbox, implements the interrupt/wait/persistent
//! policy, and performs orderly teardown.
//!
//! ## Update flow
//! ```text
//! update(config, data)
//!   ├─► snapshot & clear first_event
//!   ├─► first event with initial_run disabled → drop update
//!   ├─► active record exists?
//!   │     ├─► interruptible:      cancel it; try to take the queued slot
//!   │     │                        ├─► slot taken → return (drop update)
//!   │     │                        └─► slot won   → await done, fall through
//!   │     ├─► persistent (non-interruptible): task never yields → drop update
//!   │     └─► non-interruptible:  try to take the queued slot; await done
//!   ├─► teardown initiated? → return without starting anything
//!   └─► allocate fresh record (new id, child token, done latch),
//!       start retry loop in the background, install as active
//! ```
//!
//! ## Rules
//! - The state lock is **never** held across a `done` await; the `queued`
//!   flag is the serialization mechanism.
//! - The background wrapper clears `active` (identity check by record id)
//!   **before** resolving `done`.
//! - Task failures never propagate out of `update`; they are published and
//!   logged.
//! - `teardown()` is idempotent and does **not** await the draining task;
//!   the pool awaits active completions before calling it.

use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use crate::events::{Bus, Event, EventKind};
use crate::ids;
use crate::manager::record::ActiveTask;
use crate::manager::runner;
use crate::spawn::Spawner;
use crate::tasks::{TaskTemplate, TeardownContext};

/// Per-slot mutable state, guarded by the manager's mutex.
struct ManagerState {
    /// The in-flight record, if any. If set, its `done` latch is unresolved.
    active: Option<Arc<ActiveTask>>,
    /// Latch: once true, no new task is ever started.
    teardown_initiated: bool,
    /// Latch: true until the first update consumes it.
    first_event: bool,
}

/// Drives one slot of the pool: at most one active task, one queued update.
pub struct TaskManager<C, D> {
    template: Arc<TaskTemplate<C, D>>,
    entry_id: String,
    bus: Bus,
    state: Arc<Mutex<ManagerState>>,
}

impl<C, D> TaskManager<C, D>
where
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    /// Creates a manager for the given slot tag.
    pub fn new(template: Arc<TaskTemplate<C, D>>, entry_id: impl Into<String>, bus: Bus) -> Self {
        Self {
            template,
            entry_id: entry_id.into(),
            bus,
            state: Arc::new(Mutex::new(ManagerState {
                active: None,
                teardown_initiated: false,
                first_event: true,
            })),
        }
    }

    /// Returns the slot tag attached to each launch.
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// Returns true when no task is in flight.
    pub async fn is_idle(&self) -> bool {
        self.state.lock().await.active.is_none()
    }

    /// Requests that the slot reflect the given `(config, data)` pair.
    ///
    /// Returns when the pending work has either started or has been
    /// intentionally dropped. Never fails for routine task errors.
    pub async fn update(&self, config: C, data: D) {
        let is_first;
        let drain = {
            let mut st = self.state.lock().await;
            is_first = st.first_event;
            if is_first {
                st.first_event = false;
            }

            if is_first && !self.template.initial_run() {
                // the first event is consumed; runs start with the next one
                self.bus.publish(
                    Event::now(EventKind::UpdateDropped)
                        .with_slot(&self.entry_id)
                        .with_error("initial run disabled"),
                );
                return;
            }

            match st.active.clone() {
                None => None,
                Some(rec) => {
                    if self.template.interruptible() {
                        rec.abort();
                        if !rec.try_enqueue() {
                            // another updater is already waiting; the slot's
                            // data intent will be satisfied by that updater
                            self.publish_dropped(rec.id(), "mailbox full");
                            return;
                        }
                        self.publish_queued(rec.id());
                        Some(rec)
                    } else if self.template.persistent() {
                        // the task never returns voluntarily; nothing to wait for
                        self.publish_dropped(rec.id(), "persistent task never yields");
                        return;
                    } else {
                        if !rec.try_enqueue() {
                            self.publish_dropped(rec.id(), "mailbox full");
                            return;
                        }
                        self.publish_queued(rec.id());
                        Some(rec)
                    }
                }
            }
        };

        if let Some(rec) = drain {
            rec.wait_done().await;
        }

        let mut st = self.state.lock().await;
        if st.teardown_initiated {
            return;
        }

        let task_id = ids::short_id();
        let cancel = self.template.parent_cancel().child_token();
        let (done_tx, done_rx) = watch::channel(false);
        let record = Arc::new(ActiveTask::new(task_id.clone(), cancel.clone(), done_rx));
        st.active = Some(Arc::clone(&record));
        drop(st);

        let template = Arc::clone(&self.template);
        let state = Arc::clone(&self.state);
        let bus = self.bus.clone();
        let entry_id = self.entry_id.clone();

        tokio::spawn(async move {
            let res = runner::run_attempts(
                &template, &entry_id, &task_id, is_first, config, data, cancel, &bus,
            )
            .await;

            match res {
                Ok(()) => {}
                Err(e) if e.is_canceled() => {}
                Err(e) => {
                    tracing::warn!(
                        slot = %entry_id,
                        task = %task_id,
                        error = %e,
                        "task failed; retries exhausted"
                    );
                }
            }

            {
                let mut st = state.lock().await;
                if st.active.as_ref().is_some_and(|r| r.id() == task_id) {
                    st.active = None;
                }
            }
            let _ = done_tx.send(true);
        });
    }

    /// Requests graceful shutdown of the slot.
    ///
    /// Idempotent: the second call is a no-op. Cancels the active record
    /// and runs the template's teardown hook; hook errors are logged, never
    /// re-raised. Does not await the draining task — the pool awaits active
    /// completions before calling this.
    pub async fn teardown(&self) {
        {
            let mut st = self.state.lock().await;
            if st.teardown_initiated {
                return;
            }
            st.teardown_initiated = true;
            if let Some(rec) = &st.active {
                rec.abort();
            }
        }

        if let Some(hook) = self.template.teardown() {
            let task_id = ids::short_id();
            let spawn = Spawner::new(
                task_id.clone(),
                None,
                self.template.cwd().cloned(),
                self.template.throttle(),
            );
            let ctx = TeardownContext {
                task_id: task_id.clone(),
                spawn,
            };
            if let Err(e) = hook.teardown(ctx).await {
                tracing::warn!(
                    slot = %self.entry_id,
                    task = %task_id,
                    error = %e,
                    "teardown hook failed"
                );
                self.bus.publish(
                    Event::now(EventKind::TeardownFailed)
                        .with_slot(&self.entry_id)
                        .with_task_id(task_id)
                        .with_error(e.to_string()),
                );
            }
        }
    }

    /// Waits until the current active record, if any, has drained.
    ///
    /// Used by the pool before invoking `teardown()`.
    pub(crate) async fn wait_idle(&self) {
        let rec = { self.state.lock().await.active.clone() };
        if let Some(rec) = rec {
            rec.wait_done().await;
        }
    }

    fn publish_queued(&self, task_id: &str) {
        self.bus.publish(
            Event::now(EventKind::UpdateQueued)
                .with_slot(&self.entry_id)
                .with_task_id(task_id),
        );
    }

    fn publish_dropped(&self, task_id: &str, reason: &str) {
        self.bus.publish(
            Event::now(EventKind::UpdateDropped)
                .with_slot(&self.entry_id)
                .with_task_id(task_id)
                .with_error(reason),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    use tokio_util::sync::CancellationToken;

    use crate::error::TaskError;
    use crate::tasks::{LaunchContext, RetryPolicy, TemplateBuilder, TeardownFn};

    /// Call log entry: (data, attempt, first).
    type CallLog = Arc<StdMutex<Vec<(String, u32, bool)>>>;

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            retries: 3,
            factor: 1.0,
            min_timeout: Duration::from_millis(10),
            max_timeout: Duration::from_millis(100),
        }
    }

    fn manager_from(
        builder: TemplateBuilder,
        body: impl Fn(LaunchContext<String, String>) -> futures::future::BoxFuture<'static, Result<(), TaskError>>
        + Send
        + Sync
        + 'static,
    ) -> TaskManager<String, String> {
        let template = builder
            .with_retry(quick_retry())
            .build_fn(move |ctx| body(ctx))
            .unwrap();
        TaskManager::new(Arc::new(template), "0", Bus::new(256))
    }

    /// Launch body that records the call and returns immediately.
    fn recording_body(log: CallLog) -> impl Fn(LaunchContext<String, String>) -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
        move |ctx| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push((ctx.data, ctx.attempt, ctx.first));
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn first_update_launches_once_with_first_flag() {
        let log: CallLog = Arc::default();
        let mgr = manager_from(TemplateBuilder::new("t"), recording_body(Arc::clone(&log)));

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls = log.lock().unwrap().clone();
        assert_eq!(calls, vec![("a".to_string(), 0, true)]);
        assert!(mgr.is_idle().await);
    }

    #[tokio::test]
    async fn second_update_clears_first_flag() {
        let log: CallLog = Arc::default();
        let mgr = manager_from(TemplateBuilder::new("t"), recording_body(Arc::clone(&log)));

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        mgr.update("cfg".into(), "b".into()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls = log.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ("b".to_string(), 0, false));
    }

    #[tokio::test]
    async fn disabled_initial_run_skips_the_first_event() {
        let log: CallLog = Arc::default();
        let mgr = manager_from(
            TemplateBuilder::new("t").initial_run(false),
            recording_body(Arc::clone(&log)),
        );

        // the first event is consumed without launching anything
        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(log.lock().unwrap().is_empty());
        assert!(mgr.is_idle().await);

        // the second event fires normally, with the first flag spent
        mgr.update("cfg".into(), "b".into()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls = log.lock().unwrap().clone();
        assert_eq!(calls, vec![("b".to_string(), 0, false)]);
    }

    #[tokio::test]
    async fn interrupt_cancels_active_and_replaces_it() {
        let log: CallLog = Arc::default();
        let body = {
            let log = Arc::clone(&log);
            move |ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().unwrap().push((ctx.data.clone(), ctx.attempt, ctx.first));
                    if ctx.data == "a" {
                        // hold until interrupted
                        ctx.cancel.cancelled().await;
                        return Err(TaskError::Canceled);
                    }
                    Ok(())
                })
            }
        };
        let mgr = manager_from(TemplateBuilder::new("t"), body);

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        mgr.update("cfg".into(), "b".into()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls = log.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ("a".to_string(), 0, true));
        assert_eq!(calls[1], ("b".to_string(), 0, false));
        assert!(mgr.is_idle().await);
    }

    #[tokio::test]
    async fn burst_collapses_to_one_queued_update() {
        let log: CallLog = Arc::default();
        let body = {
            let log = Arc::clone(&log);
            move |ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().unwrap().push((ctx.data.clone(), ctx.attempt, ctx.first));
                    if ctx.data == "a" {
                        // slow drain keeps the record active while the burst arrives
                        ctx.cancel.cancelled().await;
                        tokio::time::sleep(Duration::from_millis(150)).await;
                        return Err(TaskError::Canceled);
                    }
                    Ok(())
                })
            }
        };
        let mgr = Arc::new(manager_from(TemplateBuilder::new("t"), body));

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        // first burst member wins the queued slot and waits
        let queued = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.update("cfg".into(), "b".into()).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        // the rest of the burst is dropped while the record drains
        mgr.update("cfg".into(), "c".into()).await;
        mgr.update("cfg".into(), "d".into()).await;

        queued.await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls = log.lock().unwrap().clone();
        let datas: Vec<&str> = calls.iter().map(|(d, _, _)| d.as_str()).collect();
        assert_eq!(datas, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn non_interruptible_update_waits_for_completion() {
        let log: CallLog = Arc::default();
        let was_cancelled = Arc::new(AtomicU32::new(0));
        let body = {
            let log = Arc::clone(&log);
            let was_cancelled = Arc::clone(&was_cancelled);
            move |ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let log = Arc::clone(&log);
                let was_cancelled = Arc::clone(&was_cancelled);
                Box::pin(async move {
                    if ctx.data == "a" {
                        tokio::time::sleep(Duration::from_millis(80)).await;
                        if ctx.cancel.is_cancelled() {
                            was_cancelled.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    log.lock().unwrap().push((ctx.data, ctx.attempt, ctx.first));
                    Ok(())
                })
            }
        };
        let mgr = manager_from(TemplateBuilder::new("t").interruptible(false), body);

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        mgr.update("cfg".into(), "b".into()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let calls = log.lock().unwrap().clone();
        let datas: Vec<&str> = calls.iter().map(|(d, _, _)| d.as_str()).collect();
        assert_eq!(datas, vec!["a", "b"]);
        assert_eq!(was_cancelled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn persistent_non_interruptible_drops_new_events() {
        let log: CallLog = Arc::default();
        let body = {
            let log = Arc::clone(&log);
            move |ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().unwrap().push((ctx.data, ctx.attempt, ctx.first));
                    ctx.cancel.cancelled().await;
                    Err(TaskError::Canceled)
                })
            }
        };
        let mgr = manager_from(
            TemplateBuilder::new("t").persistent(true).interruptible(false),
            body,
        );

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        mgr.update("cfg".into(), "b".into()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(log.lock().unwrap().len(), 1);

        mgr.teardown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(mgr.is_idle().await);
    }

    #[tokio::test]
    async fn failing_launch_is_retried_retries_plus_one_times() {
        let count = Arc::new(AtomicU32::new(0));
        let body = {
            let count = Arc::clone(&count);
            move |_ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(TaskError::fail("boom"))
                })
            }
        };
        let template = TemplateBuilder::new("t")
            .with_retry(RetryPolicy {
                retries: 2,
                factor: 1.0,
                min_timeout: Duration::from_millis(10),
                max_timeout: Duration::from_millis(100),
            })
            .build_fn(body)
            .unwrap();
        let mgr = TaskManager::new(Arc::new(template), "0", Bus::new(256));

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(mgr.is_idle().await);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let count = Arc::new(AtomicU32::new(0));
        let body = {
            let count = Arc::clone(&count);
            move |_ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err(TaskError::fail("boom"))
                })
            }
        };
        let template = TemplateBuilder::new("t")
            .with_retry(RetryPolicy {
                retries: 0,
                factor: 1.0,
                min_timeout: Duration::from_millis(10),
                max_timeout: Duration::from_millis(100),
            })
            .build_fn(body)
            .unwrap();
        let mgr = TaskManager::new(Arc::new(template), "0", Bus::new(256));

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(mgr.is_idle().await);
    }

    #[tokio::test]
    async fn persistent_relaunches_until_parent_cancel() {
        let count = Arc::new(AtomicU32::new(0));
        let root = CancellationToken::new();
        let body = {
            let count = Arc::clone(&count);
            move |_ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(())
                })
            }
        };
        let template = TemplateBuilder::new("t")
            .persistent(true)
            .with_parent_cancel(root.clone())
            .with_retry(quick_retry())
            .build_fn(body)
            .unwrap();
        let mgr = TaskManager::new(Arc::new(template), "0", Bus::new(256));

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(count.load(Ordering::SeqCst) >= 3);

        root.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), settled);
        assert!(mgr.is_idle().await);
    }

    #[tokio::test]
    async fn teardown_is_idempotent_and_runs_hook_once() {
        let hook_calls = Arc::new(AtomicU32::new(0));
        let hook = {
            let hook_calls = Arc::clone(&hook_calls);
            TeardownFn::arc(move |_ctx: crate::tasks::TeardownContext| {
                let hook_calls = Arc::clone(&hook_calls);
                async move {
                    hook_calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), TaskError>(())
                }
            })
        };
        let template = TemplateBuilder::new("t")
            .with_teardown(hook)
            .with_retry(quick_retry())
            .build_fn(|_ctx: LaunchContext<String, String>| async { Ok(()) })
            .unwrap();
        let mgr = TaskManager::new(Arc::new(template), "0", Bus::new(256));

        mgr.teardown().await;
        mgr.teardown().await;

        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_launch_starts_after_teardown() {
        let count = Arc::new(AtomicU32::new(0));
        let body = {
            let count = Arc::clone(&count);
            move |_ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            }
        };
        let mgr = manager_from(TemplateBuilder::new("t"), body);

        mgr.teardown().await;
        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn teardown_does_not_wait_for_draining_task() {
        let body = move |ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
            Box::pin(async move {
                ctx.cancel.cancelled().await;
                tokio::time::sleep(Duration::from_millis(300)).await;
                Err(TaskError::Canceled)
            })
        };
        let mgr = manager_from(TemplateBuilder::new("t"), body);

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        mgr.teardown().await;
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn queued_updater_backs_off_when_teardown_starts() {
        let count = Arc::new(AtomicU32::new(0));
        let body = {
            let count = Arc::clone(&count);
            move |ctx: LaunchContext<String, String>| -> futures::future::BoxFuture<'static, Result<(), TaskError>> {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    ctx.cancel.cancelled().await;
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Err(TaskError::Canceled)
                })
            }
        };
        let mgr = Arc::new(manager_from(TemplateBuilder::new("t"), body));

        mgr.update("cfg".into(), "a".into()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let queued = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move { mgr.update("cfg".into(), "b".into()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        mgr.teardown().await;
        queued.await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        // only the original launch ever ran
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
