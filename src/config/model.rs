// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::state::{RetryPolicy, StateOptions};

/// Configuration as read from a TOML file.
///
/// ```toml
/// [checkpoint]
/// retry_delay = "50ms"
/// retry_budget = "5s"
///
/// [prune]
/// retention = "24h"
/// abort_age = "7d"
/// interval = "10m"
/// ```
///
/// All sections are optional. Durations stay strings here; they are parsed
/// and checked when converting into a [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub checkpoint: RawCheckpointSection,

    #[serde(default)]
    pub prune: RawPruneSection,
}

/// `[checkpoint]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCheckpointSection {
    /// Pause between attempts when the backend fails.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    /// Total time a failing checkpoint is retried before the process gives up.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: String,
}

fn default_retry_delay() -> String {
    "50ms".to_string()
}

fn default_retry_budget() -> String {
    "5s".to_string()
}

impl Default for RawCheckpointSection {
    fn default() -> Self {
        Self {
            retry_delay: default_retry_delay(),
            retry_budget: default_retry_budget(),
        }
    }
}

/// `[prune]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPruneSection {
    /// How long ready changes are kept.
    #[serde(default = "default_retention")]
    pub retention: String,

    /// How long a change may stay unready before its tasks are held.
    #[serde(default = "default_abort_age")]
    pub abort_age: String,

    /// How often the embedding daemon should run the sweep.
    #[serde(default = "default_interval")]
    pub interval: String,
}

fn default_retention() -> String {
    "24h".to_string()
}

fn default_abort_age() -> String {
    "7d".to_string()
}

fn default_interval() -> String {
    "10m".to_string()
}

impl Default for RawPruneSection {
    fn default() -> Self {
        Self {
            retention: default_retention(),
            abort_age: default_abort_age(),
            interval: default_interval(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigFile {
    pub checkpoint: CheckpointConfig,
    pub prune: PruneConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointConfig {
    pub retry_delay: Duration,
    pub retry_budget: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PruneConfig {
    pub retention: Duration,
    pub abort_age: Duration,
    pub interval: Duration,
}

impl ConfigFile {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.checkpoint.retry_delay, self.checkpoint.retry_budget)
    }

    /// State options using the system clock.
    pub fn state_options(&self) -> StateOptions {
        StateOptions {
            retry: self.retry_policy(),
            ..StateOptions::default()
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            checkpoint: CheckpointConfig {
                retry_delay: RetryPolicy::DEFAULT_DELAY,
                retry_budget: RetryPolicy::DEFAULT_BUDGET,
            },
            prune: PruneConfig {
                retention: Duration::from_secs(24 * 60 * 60),
                abort_age: Duration::from_secs(7 * 24 * 60 * 60),
                interval: Duration::from_secs(10 * 60),
            },
        }
    }
}
