//! Configuration system for JobForge.
//!
//! Load solver manager configuration from TOML or YAML files to size the
//! worker pools and tune shutdown without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use jobforge_config::{ResubmitPolicy, SolverManagerConfig, ThreadCount};
//! use std::time::Duration;
//!
//! let config = SolverManagerConfig::from_toml_str(r#"
//!     solving_thread_count = { count = 4 }
//!     shutdown_grace_millis = 2500
//!     resubmit_policy = "replace_stopped"
//! "#).unwrap();
//!
//! assert_eq!(config.solving_thread_count, ThreadCount::Count(4));
//! assert_eq!(config.shutdown_grace(), Duration::from_millis(2500));
//! assert_eq!(config.resubmit_policy, ResubmitPolicy::ReplaceStopped);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use jobforge_config::SolverManagerConfig;
//!
//! let config = SolverManagerConfig::load("solver-manager.toml").unwrap_or_default();
//! assert!(config.solving_threads() >= 1);
//! ```

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of threads kept free for the event pool and callers.
pub const DEFAULT_RESERVED_THREAD_COUNT: usize = 2;

/// Default grace period of a blocking shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MILLIS: u64 = 1_000;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Solver manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SolverManagerConfig {
    /// Size of the solving pool.
    pub solving_thread_count: ThreadCount,

    /// Threads subtracted from the available parallelism when the solving
    /// pool is sized automatically.
    pub reserved_thread_count: usize,

    /// How long a blocking shutdown waits for in-flight jobs, in milliseconds.
    pub shutdown_grace_millis: u64,

    /// What happens when a problem id is submitted again.
    pub resubmit_policy: ResubmitPolicy,
}

impl Default for SolverManagerConfig {
    fn default() -> Self {
        Self {
            solving_thread_count: ThreadCount::Auto,
            reserved_thread_count: DEFAULT_RESERVED_THREAD_COUNT,
            shutdown_grace_millis: DEFAULT_SHUTDOWN_GRACE_MILLIS,
            resubmit_policy: ResubmitPolicy::Reject,
        }
    }
}

impl SolverManagerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist, contains invalid TOML or
    /// fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.solving_thread_count == ThreadCount::Count(0) {
            return Err(ConfigError::Invalid(
                "solving_thread_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets a fixed solving pool size.
    pub fn with_solving_threads(mut self, count: usize) -> Self {
        self.solving_thread_count = ThreadCount::Count(count);
        self
    }

    /// Sets the headroom kept free under automatic sizing.
    pub fn with_reserved_threads(mut self, count: usize) -> Self {
        self.reserved_thread_count = count;
        self
    }

    /// Sets the blocking shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_millis = grace.as_millis() as u64;
        self
    }

    /// Sets the resubmission policy.
    pub fn with_resubmit_policy(mut self, policy: ResubmitPolicy) -> Self {
        self.resubmit_policy = policy;
        self
    }

    /// Returns the blocking shutdown grace period.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_millis)
    }

    /// Returns the resolved solving pool size.
    ///
    /// Automatic sizing is `max(1, available parallelism - reserved)`.
    ///
    /// ```
    /// use jobforge_config::SolverManagerConfig;
    ///
    /// let config = SolverManagerConfig::new().with_solving_threads(3);
    /// assert_eq!(config.solving_threads(), 3);
    /// ```
    pub fn solving_threads(&self) -> usize {
        match self.solving_thread_count {
            ThreadCount::Count(count) => count.max(1),
            ThreadCount::Auto => {
                let available = std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1);
                ThreadCount::resolve_auto(available, self.reserved_thread_count)
            }
        }
    }
}

/// Thread count configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadCount {
    /// Derive the count from the available parallelism.
    #[default]
    Auto,

    /// Specific number of threads.
    Count(usize),
}

impl ThreadCount {
    /// Automatic sizing for a given number of cores.
    pub fn resolve_auto(available: usize, reserved: usize) -> usize {
        available.saturating_sub(reserved).max(1)
    }
}

/// Policy for submitting a problem id that is already registered.
///
/// Submitting an id whose job is still solving is always rejected. The
/// policy only decides what happens to records of stopped jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResubmitPolicy {
    /// Stopped records are retained until explicitly evicted; resubmitting
    /// their id fails.
    #[default]
    Reject,

    /// A stopped record is replaced by the new submission.
    ReplaceStopped,
}
