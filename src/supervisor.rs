//! # Supervisor: wires a watcher to the manager pool.
//!
//! The [`Supervisor`] owns the runtime components (event bus, subscriber
//! set, root cancellation token, manager pool) and drives the
//! load-parse-derive-trigger cycle from watcher events to the pool.
//!
//! ## Architecture
//! ```text
//! Supervisor::run(watcher)
//!     │
//!     ├──► subscriber_listener()  (Bus ──► SubscriberSet fan-out)
//!     │
//!     └──► loop:
//!           ├──► Ready            → reload() (initial runs)
//!           ├──► Change           → settle (debounce `wait`) → reload()
//!           ├──► Error pre-ready  → return Err
//!           ├──► Error post-ready → shutdown
//!           ├──► OS signal        → shutdown
//!           └──► root cancelled   → shutdown
//!
//! reload():  read file → parse_config → process_data → pool.trigger
//!            (read/parse failures are logged; last state is kept)
//!
//! shutdown(): close watcher → cancel root signal → pool.teardown()
//!             (exactly once; later signals are ignored with a warning)
//! ```
//!
//! ## Rules
//! - The debounce is **trailing-edge**: a burst of changes collapses into
//!   a single reload after `wait` of quiet.
//! - Parse failures never crash the process; the pool keeps its state.
//! - The root token doubles as the template's parent cancellation signal,
//!   forming the cancellation tree of the whole run.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{ConfigError, RuntimeError, TemplateError};
use crate::events::{Bus, Event, EventKind};
use crate::pool::ManagerPool;
use crate::shutdown;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{Launch, TemplateBuilder};
use crate::watch::{Watch, WatchEvent};

/// Parses the watched configuration file into typed payloads.
///
/// `parse_config` turns the raw UTF-8 file contents into the typed
/// configuration; `process_data` derives the per-slot data vector from it.
pub trait ConfigParser: Send + Sync + 'static {
    /// Typed configuration payload shared with every launch.
    type Config: Clone + Send + Sync + 'static;
    /// Typed per-slot data payload.
    type Data: Clone + Send + Sync + 'static;

    /// Parses the raw file contents.
    fn parse_config(&self, raw: &str) -> Result<Self::Config, ConfigError>;

    /// Derives the per-slot data vector from the configuration.
    fn process_data(&self, config: &Self::Config) -> Result<Vec<Self::Data>, ConfigError>;
}

/// Outcome of the debounce window.
enum Settle {
    /// The burst went quiet; reload.
    Quiet,
    /// Shutdown was requested while settling.
    Shutdown,
    /// The watcher closed while settling.
    Closed,
    /// The watcher failed while settling.
    Failed(String),
}

/// Builder wiring a supervisor: config, subscribers, template, parser.
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the supervisor.
    ///
    /// The supervisor owns the root cancellation token; the template is
    /// finished here so that its parent signal is chained to that root.
    /// Fails only on an invalid template configuration.
    pub fn build<P>(
        self,
        path: impl Into<PathBuf>,
        parser: P,
        template: TemplateBuilder,
        launch: Arc<dyn Launch<P::Config, P::Data>>,
    ) -> Result<Supervisor<P>, TemplateError>
    where
        P: ConfigParser,
    {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let root = CancellationToken::new();

        let template = template.with_parent_cancel(root.clone()).build(launch)?;
        let pool = Arc::new(ManagerPool::new(Arc::new(template), bus.clone()));

        Ok(Supervisor {
            cfg: self.cfg,
            path: path.into(),
            parser,
            pool,
            bus,
            subs,
            root,
        })
    }
}

/// Glue between one watched configuration file and one manager pool.
pub struct Supervisor<P: ConfigParser> {
    cfg: Config,
    path: PathBuf,
    parser: P,
    pool: Arc<ManagerPool<P::Config, P::Data>>,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    root: CancellationToken,
}

impl<P: ConfigParser> Supervisor<P> {
    /// Returns the manager pool driven by this supervisor.
    pub fn pool(&self) -> &Arc<ManagerPool<P::Config, P::Data>> {
        &self.pool
    }

    /// Returns the event bus of this supervisor.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Returns a handle to the root cancellation signal.
    ///
    /// Cancelling it initiates graceful shutdown, equivalent to receiving
    /// `SIGINT`/`SIGTERM`.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Runs the supervision loop until shutdown.
    ///
    /// - Watcher `Ready` triggers the initial load-parse-trigger pass.
    /// - Debounced `Change`s re-trigger the pool.
    /// - A watcher error before readiness is returned as
    ///   [`RuntimeError::Watcher`]; after readiness it initiates shutdown.
    /// - `SIGINT`/`SIGTERM` or the root token initiate shutdown exactly
    ///   once; further signals are ignored with a warning.
    pub async fn run<W: Watch>(self, mut watcher: W) -> Result<(), RuntimeError> {
        self.spawn_subscriber_listener();

        let mut ready = false;
        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                _ = shutdown::wait_for_shutdown_signal() => break,
                ev = watcher.next() => match ev {
                    None => break,
                    Some(WatchEvent::Ready) => {
                        ready = true;
                        self.reload().await;
                    }
                    Some(WatchEvent::Change) => {
                        if !ready {
                            continue;
                        }
                        match self.settle(&mut watcher).await {
                            Settle::Quiet => self.reload().await,
                            Settle::Shutdown | Settle::Closed => break,
                            Settle::Failed(reason) => {
                                self.publish_watcher_failed(&reason);
                                break;
                            }
                        }
                    }
                    Some(WatchEvent::Error(reason)) => {
                        if !ready {
                            return Err(RuntimeError::Watcher { reason });
                        }
                        self.publish_watcher_failed(&reason);
                        break;
                    }
                }
            }
        }

        self.shutdown(watcher).await;
        Ok(())
    }

    /// Waits out a burst of changes (trailing-edge debounce).
    async fn settle<W: Watch>(&self, watcher: &mut W) -> Settle {
        loop {
            let sleep = time::sleep(self.cfg.wait);
            tokio::pin!(sleep);
            tokio::select! {
                _ = &mut sleep => return Settle::Quiet,
                _ = self.root.cancelled() => return Settle::Shutdown,
                ev = watcher.next() => match ev {
                    Some(WatchEvent::Change) | Some(WatchEvent::Ready) => continue,
                    Some(WatchEvent::Error(reason)) => return Settle::Failed(reason),
                    None => return Settle::Closed,
                }
            }
        }
    }

    /// One load-parse-derive-trigger pass.
    ///
    /// Failures are published and logged; the pool keeps its last state.
    async fn reload(&self) {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                self.publish_config_invalid(format!("read {}: {e}", self.path.display()));
                return;
            }
        };
        let config = match self.parser.parse_config(&raw) {
            Ok(config) => config,
            Err(e) => {
                self.publish_config_invalid(format!("parse: {e}"));
                return;
            }
        };
        let data = match self.parser.process_data(&config) {
            Ok(data) => data,
            Err(e) => {
                self.publish_config_invalid(format!("process data: {e}"));
                return;
            }
        };

        tracing::debug!(path = %self.path.display(), slots = data.len(), "configuration loaded");
        self.bus.publish(Event::now(EventKind::ConfigLoaded));
        self.pool.trigger(&config, &data).await;
    }

    /// Shuts down exactly once: close watcher, cancel root, drain the pool.
    async fn shutdown<W: Watch>(&self, mut watcher: W) {
        self.bus.publish(Event::now(EventKind::ShutdownRequested));

        // later signals must not re-enter shutdown
        let ignore_signals = tokio::spawn(async {
            loop {
                match shutdown::wait_for_shutdown_signal().await {
                    Ok(()) => tracing::warn!("shutdown already in progress; signal ignored"),
                    Err(_) => break,
                }
            }
        });

        watcher.close().await;
        self.root.cancel();
        self.pool.teardown().await;
        ignore_signals.abort();
    }

    fn spawn_subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
    }

    fn publish_config_invalid(&self, reason: String) {
        tracing::warn!(error = %reason, "configuration invalid; keeping last state");
        self.bus
            .publish(Event::now(EventKind::ConfigInvalid).with_error(reason));
    }

    fn publish_watcher_failed(&self, reason: &str) {
        tracing::warn!(error = %reason, "watcher failed; shutting down");
        self.bus
            .publish(Event::now(EventKind::WatcherFailed).with_error(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use crate::error::TaskError;
    use crate::tasks::{LaunchContext, LaunchFn, RetryPolicy};
    use crate::watch::PollWatcher;

    /// Line-per-slot parser: each non-empty line is one slot datum.
    struct LineParser;

    impl ConfigParser for LineParser {
        type Config = Vec<String>;
        type Data = String;

        fn parse_config(&self, raw: &str) -> Result<Self::Config, ConfigError> {
            Ok(raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect())
        }

        fn process_data(&self, config: &Self::Config) -> Result<Vec<Self::Data>, ConfigError> {
            Ok(config.clone())
        }
    }

    type SlotLog = Arc<StdMutex<Vec<(String, String, bool)>>>;

    fn build_supervisor(
        path: &std::path::Path,
        log: SlotLog,
    ) -> Supervisor<LineParser> {
        let cfg = Config {
            wait: Duration::from_millis(30),
            poll_interval: Duration::from_millis(20),
            bus_capacity: 256,
        };
        let launch = LaunchFn::arc(move |ctx: LaunchContext<Vec<String>, String>| {
            let log = Arc::clone(&log);
            async move {
                log.lock()
                    .unwrap()
                    .push((ctx.entry_id, ctx.data, ctx.first));
                Ok::<(), TaskError>(())
            }
        });
        SupervisorBuilder::new(cfg)
            .build(
                path,
                LineParser,
                TemplateBuilder::new("lines").with_retry(RetryPolicy {
                    retries: 0,
                    factor: 1.0,
                    min_timeout: Duration::from_millis(10),
                    max_timeout: Duration::from_millis(100),
                }),
                launch,
            )
            .unwrap()
    }

    async fn wait_until(deadline: Duration, cond: impl Fn() -> bool) -> bool {
        let started = tokio::time::Instant::now();
        while started.elapsed() < deadline {
            if cond() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn ready_triggers_initial_runs_and_changes_retrigger() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha").unwrap();
        file.flush().unwrap();

        let log: SlotLog = Arc::default();
        let sup = build_supervisor(file.path(), Arc::clone(&log));
        let token = sup.shutdown_token();
        let watcher = PollWatcher::with_interval(file.path(), Duration::from_millis(20));

        let run = tokio::spawn(sup.run(watcher));

        // initial pass: slot 0, first = true
        let seen = {
            let log = Arc::clone(&log);
            wait_until(Duration::from_secs(3), move || !log.lock().unwrap().is_empty()).await
        };
        assert!(seen, "initial run never happened");
        assert_eq!(
            log.lock().unwrap()[0],
            ("0".to_string(), "alpha".to_string(), true)
        );

        // grow the config: a debounced change adds slot 1
        writeln!(file, "beta").unwrap();
        file.flush().unwrap();

        let seen = {
            let log = Arc::clone(&log);
            wait_until(Duration::from_secs(3), move || {
                log.lock().unwrap().iter().any(|(slot, data, _)| slot == "1" && data == "beta")
            })
            .await
        };
        assert!(seen, "change never propagated to slot 1");

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(3), run)
            .await
            .expect("supervisor did not shut down")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_file_fails_before_ready() {
        let log: SlotLog = Arc::default();
        let sup = build_supervisor(std::path::Path::new("/nonexistent/ew.conf"), log);
        let watcher =
            PollWatcher::with_interval("/nonexistent/ew.conf", Duration::from_millis(20));

        let result = tokio::time::timeout(Duration::from_secs(3), sup.run(watcher))
            .await
            .expect("run did not return");
        assert!(matches!(result, Err(RuntimeError::Watcher { .. })));
    }

    #[tokio::test]
    async fn invalid_config_keeps_last_state() {
        // LineParser never fails to parse, so fail at the read layer:
        // point the supervisor at a directory.
        let dir = tempfile::tempdir().unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha").unwrap();
        file.flush().unwrap();

        let log: SlotLog = Arc::default();
        // watcher observes the real file, supervisor reads a directory path
        let sup = build_supervisor(dir.path(), Arc::clone(&log));
        let token = sup.shutdown_token();
        let watcher = PollWatcher::with_interval(file.path(), Duration::from_millis(20));

        let run = tokio::spawn(sup.run(watcher));
        tokio::time::sleep(Duration::from_millis(300)).await;

        // the read failure was swallowed; nothing launched, nothing crashed
        assert!(log.lock().unwrap().is_empty());

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(3), run)
            .await
            .expect("supervisor did not shut down")
            .unwrap();
        assert!(result.is_ok());
    }
}
