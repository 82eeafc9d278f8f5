//! # Built-in manifest format for the CLI binary.
//!
//! A manifest is a JSON file describing the commands to supervise and how
//! to supervise them:
//!
//! ```json
//! {
//!   "wait": 300,
//!   "retries": 2,
//!   "persistent": false,
//!   "interruptible": true,
//!   "initial_run": true,
//!   "tasks": [
//!     { "name": "build", "command": ["cargo", "build"] },
//!     { "name": "serve", "command": ["./serve.sh"], "cwd": "web" }
//!   ]
//! }
//! ```
//!
//! Each task entry is one slot datum: entry `i` of `tasks` drives slot `i`
//! of the pool. Reordering entries therefore reassigns slots; removing an
//! entry tears its slot down.
//!
//! The top-level settings (`wait`, `retries`, and the behavior flags) are
//! template-wide: one template is shared by every slot of a pool, so they
//! apply to the whole manifest, not to individual entries. The binary
//! reads them once at startup to build the supervisor; the `tasks` list is
//! the part that is live-reloaded on every change.
//!
//! [`ManifestParser`] is the [`ConfigParser`] implementation the binary
//! wires into its supervisors; [`command_launch`] is the matching launch
//! body running each entry's argv through the context spawner.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, TaskError};
use crate::supervisor::ConfigParser;
use crate::tasks::{Launch, LaunchContext, LaunchFn, RetryPolicy};

fn default_true() -> bool {
    true
}

/// Top-level manifest document.
#[derive(Clone, Debug, Deserialize)]
pub struct Manifest {
    /// Debounce window for manifest changes, in milliseconds.
    #[serde(default)]
    pub wait: Option<u64>,

    /// Number of re-attempts after a failed launch.
    #[serde(default)]
    pub retries: Option<u32>,

    /// Re-launch tasks forever until shutdown.
    #[serde(default)]
    pub persistent: bool,

    /// Cancel the in-flight task on a new event instead of waiting for it.
    #[serde(default = "default_true")]
    pub interruptible: bool,

    /// Fire a run on the first event.
    #[serde(default = "default_true")]
    pub initial_run: bool,

    /// Supervised commands, one per slot.
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            wait: None,
            retries: None,
            persistent: false,
            interruptible: true,
            initial_run: true,
            tasks: Vec::new(),
        }
    }
}

impl Manifest {
    /// Returns the debounce window, defaulting to 1s.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.wait.unwrap_or(1000))
    }

    /// Returns the retry policy, overriding only what the manifest sets.
    pub fn retry(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            retries: self.retries.unwrap_or(defaults.retries),
            ..defaults
        }
    }
}

/// One supervised command.
#[derive(Clone, Debug, Deserialize)]
pub struct TaskEntry {
    /// Label used in logs.
    pub name: String,
    /// Argv of the command to run.
    pub command: Vec<String>,
    /// Working directory override for this entry.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// JSON manifest parser.
pub struct ManifestParser;

impl ConfigParser for ManifestParser {
    type Config = Manifest;
    type Data = TaskEntry;

    fn parse_config(&self, raw: &str) -> Result<Self::Config, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::new(e.to_string()))
    }

    fn process_data(&self, config: &Self::Config) -> Result<Vec<Self::Data>, ConfigError> {
        Ok(config.tasks.clone())
    }
}

/// Launch body for manifest entries: runs the entry's argv through the
/// context spawner, honoring a per-entry working directory override.
pub fn command_launch() -> Arc<dyn Launch<Manifest, TaskEntry>> {
    LaunchFn::arc(|ctx: LaunchContext<Manifest, TaskEntry>| async move {
        let Some((program, args)) = ctx.data.command.split_first() else {
            return Err(TaskError::fail(format!(
                "task '{}' has an empty command",
                ctx.data.name
            )));
        };
        let spawn = match &ctx.data.cwd {
            Some(cwd) => ctx.spawn.clone().with_cwd(cwd),
            None => ctx.spawn.clone(),
        };
        tracing::info!(task = %ctx.data.name, slot = %ctx.entry_id, "running command");
        spawn.run(program, args).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_manifest() {
        let raw = r#"{
            "wait": 300,
            "retries": 2,
            "persistent": true,
            "interruptible": false,
            "initial_run": true,
            "tasks": [
                { "name": "build", "command": ["cargo", "build"] },
                { "name": "serve", "command": ["./serve.sh"], "cwd": "web" }
            ]
        }"#;
        let manifest = ManifestParser.parse_config(raw).unwrap();
        assert_eq!(manifest.debounce(), Duration::from_millis(300));
        assert_eq!(manifest.retry().retries, 2);
        assert!(manifest.persistent);
        assert!(!manifest.interruptible);
        assert!(manifest.initial_run);
        assert_eq!(manifest.tasks.len(), 2);
        assert_eq!(manifest.tasks[0].name, "build");
        assert_eq!(manifest.tasks[1].cwd, Some(PathBuf::from("web")));

        let data = ManifestParser.process_data(&manifest).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[1].command, vec!["./serve.sh".to_string()]);
    }

    #[test]
    fn omitted_settings_take_defaults() {
        let manifest = ManifestParser
            .parse_config(r#"{ "tasks": [] }"#)
            .unwrap();
        assert_eq!(manifest.debounce(), Duration::from_millis(1000));
        assert_eq!(manifest.retry().retries, RetryPolicy::default().retries);
        assert!(!manifest.persistent);
        assert!(manifest.interruptible);
        assert!(manifest.initial_run);
        assert!(manifest.tasks.is_empty());
    }

    #[test]
    fn missing_tasks_defaults_to_empty() {
        let manifest = ManifestParser.parse_config("{}").unwrap();
        assert!(manifest.tasks.is_empty());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(ManifestParser.parse_config("{ nope").is_err());
    }

    #[test]
    fn retry_override_keeps_other_defaults() {
        let manifest = ManifestParser
            .parse_config(r#"{ "retries": 0 }"#)
            .unwrap();
        let retry = manifest.retry();
        assert_eq!(retry.retries, 0);
        assert_eq!(retry.factor, RetryPolicy::default().factor);
        assert_eq!(retry.min_timeout, RetryPolicy::default().min_timeout);
    }
}
