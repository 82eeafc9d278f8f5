//! eirenewatch CLI — supervise the commands described by one or more
//! manifest files, re-triggering them as the manifests change on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eirenewatch::{
    Config, ConfigParser, Manifest, ManifestParser, PollWatcher, SupervisorBuilder,
    TemplateBuilder, TraceWriter, command_launch,
};

/// Environment variable enabling verbose structured logging.
const LOG_ENV: &str = "EIRENE_LOG";

/// eirenewatch - configuration-driven task supervisor
///
/// Supervision settings (debounce, retries, behavior flags) live in each
/// manifest, so every watched manifest carries its own policy.
#[derive(Parser, Debug)]
#[command(name = "eirenewatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Manifest files to supervise; entries containing '*' are glob-expanded
    #[arg(default_value = "eirenewatch.json")]
    scripts: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("eirenewatch: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let scripts = expand_scripts(&args.scripts)?;

    let mut set = JoinSet::new();
    for path in scripts {
        let settings = load_settings(&path);
        let cfg = Config {
            wait: settings.debounce(),
            ..Config::default()
        };
        let poll_interval = cfg.poll_interval;

        let template = TemplateBuilder::new(path.display().to_string())
            .with_retry(settings.retry())
            .persistent(settings.persistent)
            .interruptible(settings.interruptible)
            .initial_run(settings.initial_run);

        let supervisor = SupervisorBuilder::new(cfg)
            .with_subscribers(vec![Arc::new(TraceWriter::new())])
            .build(&path, ManifestParser, template, command_launch())
            .with_context(|| format!("invalid template for '{}'", path.display()))?;

        let watcher = PollWatcher::with_interval(&path, poll_interval);
        set.spawn(async move {
            supervisor
                .run(watcher)
                .await
                .with_context(|| format!("supervisor for '{}' failed", path.display()))
        });
    }

    let mut failed = false;
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                eprintln!("eirenewatch: {e:#}");
                failed = true;
            }
            Err(e) => {
                eprintln!("eirenewatch: supervisor panicked: {e}");
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Initializes the tracing subscriber.
///
/// Verbose logging is opt-in via `EIRENE_LOG=true`; without it only
/// warnings are emitted and a one-time notice goes to stderr.
fn init_logging() {
    let verbose = std::env::var(LOG_ENV)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    if !verbose {
        eprintln!("{LOG_ENV} is not set to \"true\"; only warnings will be logged");
    }
    let default_filter = if verbose { "info" } else { "warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Reads a manifest's supervision settings at startup.
///
/// The settings (debounce, retries, flags) shape the supervisor itself, so
/// they are snapshotted here; the task list stays live-reloaded by the
/// supervisor. An unparsable manifest falls back to default settings with
/// a notice; the supervisor logs the same parse failure and keeps watching
/// until the file is fixed.
fn load_settings(path: &Path) -> Manifest {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!(
                "eirenewatch: {}: {e}; starting with default settings",
                path.display()
            );
            return Manifest::default();
        }
    };
    match ManifestParser.parse_config(&raw) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!(
                "eirenewatch: {}: {e}; starting with default settings",
                path.display()
            );
            Manifest::default()
        }
    }
}

/// Expands positional manifest entries, glob-expanding anything with `*`.
///
/// Every resulting path must exist; a missing manifest is a startup error.
fn expand_scripts(entries: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in entries {
        if entry.contains('*') {
            let matches: Vec<PathBuf> = glob::glob(entry)
                .with_context(|| format!("invalid glob pattern '{entry}'"))?
                .flatten()
                .collect();
            if matches.is_empty() {
                bail!("no manifest matches pattern '{entry}'");
            }
            out.extend(matches);
        } else {
            out.push(PathBuf::from(entry));
        }
    }
    for path in &out {
        if !path.is_file() {
            bail!("manifest '{}' not found", path.display());
        }
    }
    Ok(out)
}
