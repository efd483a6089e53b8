//! Refresh settings loader.
//!
//! Loads and merges:
//! - System defaults: `<PRJ_ROOT>/packages/conf/refresh.yaml`
//! - User overrides:  `<PRJ_CONFIG_HOME>/omni-dev-fusion/refresh.yaml`
//!
//! Merge precedence is user over system, per field. Missing or malformed
//! files are logged and ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::backoff::BackoffPolicy;

const DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH: &str = "packages/conf/refresh.yaml";
const DEFAULT_USER_SETTINGS_RELATIVE_PATH: &str = "omni-dev-fusion/refresh.yaml";
const DEFAULT_CONFIG_HOME_RELATIVE_PATH: &str = ".config";

const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
const DEFAULT_RETAIN_FINISHED_SECS: u64 = 3600;

/// Raw settings as written in YAML; every field optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RefreshSettings {
    /// Poll interval before backoff starts.
    pub initial_interval_ms: Option<u64>,
    /// Poll interval ceiling.
    pub max_interval_ms: Option<u64>,
    /// Multiplicative growth factor.
    pub backoff_factor: Option<f64>,
    /// Checks between growth steps.
    pub backoff_grow_every: Option<u64>,
    /// Default `wait` timeout.
    pub wait_timeout_secs: Option<u64>,
    /// Registry cleanup period.
    pub cleanup_interval_secs: Option<u64>,
    /// How long finished jobs stay in the registry.
    pub retain_finished_secs: Option<u64>,
}

impl RefreshSettings {
    fn merge(self, overlay: Self) -> Self {
        Self {
            initial_interval_ms: overlay.initial_interval_ms.or(self.initial_interval_ms),
            max_interval_ms: overlay.max_interval_ms.or(self.max_interval_ms),
            backoff_factor: overlay.backoff_factor.or(self.backoff_factor),
            backoff_grow_every: overlay.backoff_grow_every.or(self.backoff_grow_every),
            wait_timeout_secs: overlay.wait_timeout_secs.or(self.wait_timeout_secs),
            cleanup_interval_secs: overlay.cleanup_interval_secs.or(self.cleanup_interval_secs),
            retain_finished_secs: overlay.retain_finished_secs.or(self.retain_finished_secs),
        }
    }

    /// Polling policy with defaults filled in.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        let defaults = BackoffPolicy::default();
        BackoffPolicy {
            initial_interval: self
                .initial_interval_ms
                .map_or(defaults.initial_interval, Duration::from_millis),
            max_interval: self
                .max_interval_ms
                .map_or(defaults.max_interval, Duration::from_millis),
            factor: self.backoff_factor.unwrap_or(defaults.factor),
            grow_every: self.backoff_grow_every.unwrap_or(defaults.grow_every),
        }
        .normalized()
    }

    /// Default timeout for `wait`.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(
            self.wait_timeout_secs
                .unwrap_or(DEFAULT_WAIT_TIMEOUT_SECS)
                .max(1),
        )
    }

    /// Period of the registry cleanup loop.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(
            self.cleanup_interval_secs
                .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS)
                .max(1),
        )
    }

    /// Retention for finished jobs.
    pub fn retain_finished(&self) -> Duration {
        Duration::from_secs(
            self.retain_finished_secs
                .unwrap_or(DEFAULT_RETAIN_FINISHED_SECS),
        )
    }
}

/// Load settings from the default system and user paths.
pub fn load_refresh_settings() -> RefreshSettings {
    let (system_path, user_path) = refresh_settings_paths();
    load_refresh_settings_from_paths(&system_path, &user_path)
}

/// Default `(system, user)` settings paths.
pub fn refresh_settings_paths() -> (PathBuf, PathBuf) {
    let root = project_root();
    let system_path = root.join(DEFAULT_SYSTEM_SETTINGS_RELATIVE_PATH);
    let user_path = config_home(&root).join(DEFAULT_USER_SETTINGS_RELATIVE_PATH);
    (system_path, user_path)
}

/// Load and merge explicit settings files, user over system.
pub fn load_refresh_settings_from_paths(system: &Path, user: &Path) -> RefreshSettings {
    load_one(system).merge(load_one(user))
}

fn load_one(path: &Path) -> RefreshSettings {
    if !path.exists() {
        return RefreshSettings::default();
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to read refresh settings file; ignoring"
            );
            return RefreshSettings::default();
        }
    };
    if raw.trim().is_empty() {
        return RefreshSettings::default();
    }
    match serde_yaml::from_str::<RefreshSettings>(&raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                path = %path.display(),
                error = %error,
                "failed to parse refresh settings yaml; ignoring file"
            );
            RefreshSettings::default()
        }
    }
}

fn project_root() -> PathBuf {
    std::env::var("PRJ_ROOT")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn config_home(root: &Path) -> PathBuf {
    match std::env::var("PRJ_CONFIG_HOME") {
        Ok(value) if !value.trim().is_empty() => {
            let path = PathBuf::from(value.trim());
            if path.is_absolute() {
                path
            } else {
                root.join(path)
            }
        }
        _ => root.join(DEFAULT_CONFIG_HOME_RELATIVE_PATH),
    }
}
