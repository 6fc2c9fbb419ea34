//! Configuration loading.
//!
//! Values are layered, later layers winning:
//! 1. Built-in defaults
//! 2. `config.json` in the platform config directory
//! 3. `VRCTL_*` environment variables
//! 4. Command-line flags (applied by the command layer)

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use nebula_reconcile::{
    RetryPolicy, DEFAULT_CONVERGENCE_TIMEOUT, DEFAULT_MAX_POLL_INTERVAL, DEFAULT_POLL_INTERVAL,
};
use serde::{Deserialize, Serialize};

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Get the config directory path.
fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("org", "nebula", "vrctl")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control plane API URL.
    pub endpoint: String,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Delay after the first poll, in milliseconds.
    pub poll_interval_ms: u64,

    /// Ceiling for the doubling poll delay, in milliseconds.
    pub max_poll_interval_ms: u64,

    /// Bound on each wait of an attach or detach, in seconds.
    pub timeout_secs: u64,

    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:2633".to_string(),
            request_timeout_secs: 30,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            max_poll_interval_ms: DEFAULT_MAX_POLL_INTERVAL.as_millis() as u64,
            timeout_secs: DEFAULT_CONVERGENCE_TIMEOUT.as_secs(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Load config from the default location and the environment.
    pub fn load() -> Result<Self> {
        let path = config_dir()?.join(CONFIG_FILE);
        let mut config = Self::from_file(&path)?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject poll intervals that would poll the control plane in a tight loop.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than zero");
        }
        if self.max_poll_interval_ms == 0 {
            anyhow::bail!("max_poll_interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// Load config from `path`, or return defaults if it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Override fields from environment variables looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = var("VRCTL_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(value) = parse_var(&var, "VRCTL_REQUEST_TIMEOUT")? {
            self.request_timeout_secs = value;
        }
        if let Some(value) = parse_var(&var, "VRCTL_POLL_INTERVAL_MS")? {
            self.poll_interval_ms = value;
        }
        if let Some(value) = parse_var(&var, "VRCTL_MAX_POLL_INTERVAL_MS")? {
            self.max_poll_interval_ms = value;
        }
        if let Some(value) = parse_var(&var, "VRCTL_TIMEOUT")? {
            self.timeout_secs = value;
        }
        if let Some(level) = var("VRCTL_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(())
    }

    /// Polling schedule for the reconciler.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.max_poll_interval_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Convergence timeout, unless a command overrides it.
    pub fn timeout(&self, override_secs: Option<u64>) -> Duration {
        Duration::from_secs(override_secs.unwrap_or(self.timeout_secs))
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("Invalid value for {name}: {raw:?}"))
        })
        .transpose()
}
