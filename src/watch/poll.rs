//! # Polling watcher backend.
//!
//! [`PollWatcher`] observes a file by polling its metadata (mtime + size)
//! on an interval. Portable across platforms and filesystems at the cost
//! of detection latency — acceptable here because the supervisor debounces
//! changes anyway.
//!
//! ## Behavior
//! - First successful stat emits `Ready`; a missing file at startup emits
//!   `Error` (the supervisor rejects before readiness).
//! - Any observed metadata difference emits `Change`.
//! - A file that disappears after readiness is **not** an error: editors
//!   and atomic-rename writers briefly remove the path. The watcher keeps
//!   polling; the reappearance registers as a change.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use super::watcher::{Watch, WatchEvent};

/// Metadata signature used to detect modifications.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Signature {
    modified: Option<SystemTime>,
    len: u64,
}

async fn stat(path: &Path) -> std::io::Result<Signature> {
    let meta = tokio::fs::metadata(path).await?;
    Ok(Signature {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

/// File watcher backed by metadata polling.
pub struct PollWatcher {
    rx: mpsc::Receiver<WatchEvent>,
    stop: CancellationToken,
    poll_loop: Option<JoinHandle<()>>,
}

impl PollWatcher {
    /// Default polling interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

    /// Creates a watcher polling every [`Self::DEFAULT_INTERVAL`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_interval(path, Self::DEFAULT_INTERVAL)
    }

    /// Creates a watcher with an explicit polling interval.
    pub fn with_interval(path: impl Into<PathBuf>, interval: Duration) -> Self {
        let path = path.into();
        let stop = CancellationToken::new();
        let (tx, rx) = mpsc::channel(16);

        let loop_stop = stop.clone();
        let poll_loop = tokio::spawn(async move {
            let mut last = match stat(&path).await {
                Ok(sig) => {
                    if tx.send(WatchEvent::Ready).await.is_err() {
                        return;
                    }
                    Some(sig)
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(format!("{}: {e}", path.display()))).await;
                    return;
                }
            };

            loop {
                let sleep = time::sleep(interval);
                tokio::pin!(sleep);
                tokio::select! {
                    _ = &mut sleep => {}
                    _ = loop_stop.cancelled() => return,
                }

                match stat(&path).await {
                    Ok(sig) => {
                        if last != Some(sig) {
                            last = Some(sig);
                            if tx.send(WatchEvent::Change).await.is_err() {
                                return;
                            }
                        }
                    }
                    // transient: atomic-rename writers remove the path briefly
                    Err(_) => last = None,
                }
            }
        });

        Self {
            rx,
            stop,
            poll_loop: Some(poll_loop),
        }
    }
}

#[async_trait]
impl Watch for PollWatcher {
    async fn next(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.poll_loop.take() {
            let _ = handle.await;
        }
        self.rx.close();
    }
}
