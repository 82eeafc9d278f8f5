//! # Command execution helper bound to a task.
//!
//! [`Spawner`] is handed to launch and teardown bodies through their
//! contexts. It is bound to the task id, the task's cancellation token
//! (absent for teardown runs), the template's working directory, and the
//! template's output throttle.
//!
//! ## Behavior
//! - Child stdout/stderr are piped and forwarded line-by-line through
//!   `tracing`, batched per [`OutputThrottle`].
//! - Cancellation kills the child (`start_kill` + wait) and surfaces
//!   [`TaskError::Canceled`] so the retry loop recognizes the abort.
//! - A non-zero exit status is a [`TaskError::Fail`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    task::JoinHandle,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;

/// Output-rate policy for spawned commands.
///
/// Child output is accumulated and flushed to the logger at most once per
/// `delay`. `Duration::ZERO` disables batching (every line is forwarded
/// immediately).
#[derive(Clone, Copy, Debug)]
pub struct OutputThrottle {
    /// Minimum interval between output flushes.
    pub delay: Duration,
}

impl Default for OutputThrottle {
    /// Returns a throttle flushing at most once per second.
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1000),
        }
    }
}

impl OutputThrottle {
    /// Returns a throttle that forwards every line immediately.
    pub fn unthrottled() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

/// Command-execution helper carried by launch and teardown contexts.
#[derive(Clone)]
pub struct Spawner {
    task_id: String,
    cancel: Option<CancellationToken>,
    cwd: Option<PathBuf>,
    throttle: OutputThrottle,
}

impl Spawner {
    /// Creates a spawner bound to the given task.
    pub(crate) fn new(
        task_id: impl Into<String>,
        cancel: Option<CancellationToken>,
        cwd: Option<PathBuf>,
        throttle: OutputThrottle,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            cancel,
            cwd,
            throttle,
        }
    }

    /// Returns the task id this spawner is bound to.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Returns a spawner with the working directory replaced.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Runs a command to completion.
    ///
    /// - Cancellation (if a token is bound) kills the child and returns
    ///   [`TaskError::Canceled`].
    /// - A spawn failure or non-zero exit returns [`TaskError::Fail`].
    pub async fn run(&self, program: &str, args: &[String]) -> Result<(), TaskError> {
        if let Some(cancel) = &self.cancel {
            if cancel.is_cancelled() {
                return Err(TaskError::Canceled);
            }
        }

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| TaskError::fail(format!("spawn {program}: {e}")))?;

        let out = child
            .stdout
            .take()
            .map(|s| self.relay(s, "stdout"));
        let err = child
            .stderr
            .take()
            .map(|s| self.relay(s, "stderr"));

        let status = match &self.cancel {
            Some(cancel) => {
                tokio::select! {
                    status = child.wait() => status,
                    _ = cancel.cancelled() => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        Self::join_relays(out, err).await;
                        return Err(TaskError::Canceled);
                    }
                }
            }
            None => child.wait().await,
        };

        Self::join_relays(out, err).await;

        let status = status.map_err(|e| TaskError::fail(format!("wait {program}: {e}")))?;
        if status.success() {
            Ok(())
        } else {
            Err(TaskError::fail(format!("{program} exited with {status}")))
        }
    }

    /// Forwards one child stream line-by-line through `tracing`, batching
    /// flushes per the output throttle.
    fn relay<R>(&self, stream: R, name: &'static str) -> JoinHandle<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let task_id = self.task_id.clone();
        let delay = self.throttle.delay;

        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            let mut pending: Vec<String> = Vec::new();
            let mut last_flush = Instant::now();

            while let Ok(Some(line)) = lines.next_line().await {
                if delay.is_zero() {
                    tracing::info!(task = %task_id, stream = name, "{line}");
                    continue;
                }
                pending.push(line);
                if last_flush.elapsed() >= delay {
                    tracing::info!(task = %task_id, stream = name, "{}", pending.join("\n"));
                    pending.clear();
                    last_flush = Instant::now();
                }
            }
            if !pending.is_empty() {
                tracing::info!(task = %task_id, stream = name, "{}", pending.join("\n"));
            }
        })
    }

    async fn join_relays(out: Option<JoinHandle<()>>, err: Option<JoinHandle<()>>) {
        if let Some(h) = out {
            let _ = h.await;
        }
        if let Some(h) = err {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawner(cancel: Option<CancellationToken>) -> Spawner {
        Spawner::new("test-task", cancel, None, OutputThrottle::unthrottled())
    }

    #[tokio::test]
    async fn successful_command_returns_ok() {
        let result = spawner(None).run("echo", &["hello".to_string()]).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn failing_command_returns_fail() {
        let result = spawner(None).run("false", &[]).await;
        match result {
            Err(TaskError::Fail { .. }) => {}
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_returns_fail() {
        let result = spawner(None)
            .run("definitely-not-a-real-binary-xyz", &[])
            .await;
        assert!(matches!(result, Err(TaskError::Fail { .. })));
    }

    #[tokio::test]
    async fn cancellation_kills_child() {
        let token = CancellationToken::new();
        let sp = spawner(Some(token.clone()));

        let handle = tokio::spawn(async move { sp.run("sleep", &["5".to_string()]).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("child was not killed in time")
            .expect("spawn task panicked");
        assert!(matches!(result, Err(TaskError::Canceled)));
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let result = spawner(Some(token)).run("echo", &["hi".to_string()]).await;
        assert!(matches!(result, Err(TaskError::Canceled)));
    }
}
