//! # Retry loop: drives all launch attempts of one active record.
//!
//! Executes the template's launch body under the record's cancellation
//! token, publishing lifecycle events to the [`Bus`].
//!
//! ## Flow
//! ```text
//! loop {
//!   ├─► check cancellation (fast-path)
//!   ├─► attempt > 0: sleep min(attempt × factor × min_timeout, max_timeout)
//!   │               (sleep races the cancellation token)
//!   ├─► publish TaskStarting
//!   ├─► launch(ctx)
//!   │     ├─► Ok          → TaskStopped; persistent ? re-enter : return Ok
//!   │     ├─► Canceled    → TaskStopped; return (task aborted, never retried)
//!   │     └─► Err(e)      → TaskFailed;
//!   │           persistent       → re-enter immediately (attempt untouched)
//!   │           retries left > 0 → attempt += 1, re-enter (sleeps first)
//!   │           exhausted        → return Err(e)
//! }
//! ```
//!
//! ## Rules
//! - Attempts run **sequentially** within one record (never parallel)
//! - `task_id` is stable across all attempts of the record
//! - In persistent mode `attempt` is never advanced, so neither backoff
//!   nor exhaustion applies

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::spawn::Spawner;
use crate::tasks::{LaunchContext, TaskTemplate};

/// Runs every attempt of one active record until success, abort, or
/// retry exhaustion.
pub(crate) async fn run_attempts<C, D>(
    template: &TaskTemplate<C, D>,
    entry_id: &str,
    task_id: &str,
    first: bool,
    config: C,
    data: D,
    cancel: CancellationToken,
    bus: &Bus,
) -> Result<(), TaskError>
where
    C: Clone + Send + Sync + 'static,
    D: Clone + Send + Sync + 'static,
{
    let retry = template.retry();
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(TaskError::Canceled);
        }

        if attempt > 0 {
            let delay = retry.delay(attempt);
            bus.publish(
                Event::now(EventKind::BackoffScheduled)
                    .with_slot(entry_id)
                    .with_task_id(task_id)
                    .with_attempt(attempt)
                    .with_delay(delay),
            );
            let sleep = time::sleep(delay);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => {}
                _ = cancel.cancelled() => return Err(TaskError::Canceled),
            }
        }

        let ctx = LaunchContext {
            entry_id: entry_id.to_string(),
            task_id: task_id.to_string(),
            attempt,
            first,
            config: config.clone(),
            data: data.clone(),
            cancel: cancel.clone(),
            spawn: Spawner::new(
                task_id,
                Some(cancel.clone()),
                template.cwd().cloned(),
                template.throttle(),
            ),
        };

        bus.publish(
            Event::now(EventKind::TaskStarting)
                .with_slot(entry_id)
                .with_task_id(task_id)
                .with_attempt(attempt),
        );

        let span = tracing::info_span!("task", slot = %entry_id, task = %task_id, attempt);
        let res = template.launch().launch(ctx).instrument(span).await;

        match res {
            Ok(()) => {
                bus.publish(
                    Event::now(EventKind::TaskStopped)
                        .with_slot(entry_id)
                        .with_task_id(task_id)
                        .with_attempt(attempt),
                );
                if template.persistent() {
                    continue;
                }
                return Ok(());
            }
            Err(TaskError::Canceled) => {
                // graceful exit, not a failure
                bus.publish(
                    Event::now(EventKind::TaskStopped)
                        .with_slot(entry_id)
                        .with_task_id(task_id)
                        .with_attempt(attempt),
                );
                return Err(TaskError::Canceled);
            }
            Err(e) => {
                bus.publish(
                    Event::now(EventKind::TaskFailed)
                        .with_slot(entry_id)
                        .with_task_id(task_id)
                        .with_attempt(attempt)
                        .with_error(e.to_string()),
                );
                if template.persistent() {
                    continue;
                }
                if retry.retries.saturating_sub(attempt) > 0 {
                    attempt += 1;
                    continue;
                }
                return Err(e);
            }
        }
    }
}
