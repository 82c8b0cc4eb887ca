// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{CheckpointConfig, ConfigFile, PruneConfig, RawConfigFile};
use crate::errors::{Result, StateError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = StateError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let checkpoint = CheckpointConfig {
            retry_delay: field("checkpoint", "retry_delay", &raw.checkpoint.retry_delay)?,
            retry_budget: field("checkpoint", "retry_budget", &raw.checkpoint.retry_budget)?,
        };
        let prune = PruneConfig {
            retention: field("prune", "retention", &raw.prune.retention)?,
            abort_age: field("prune", "abort_age", &raw.prune.abort_age)?,
            interval: field("prune", "interval", &raw.prune.interval)?,
        };

        validate_checkpoint(&checkpoint)?;
        validate_prune(&prune)?;

        Ok(ConfigFile { checkpoint, prune })
    }
}

fn field(section: &str, key: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| StateError::ConfigError(format!("[{section}].{key}: {e}")))
}

fn validate_checkpoint(cfg: &CheckpointConfig) -> Result<()> {
    if cfg.retry_delay.is_zero() {
        return Err(StateError::ConfigError(
            "[checkpoint].retry_delay must be greater than zero".to_string(),
        ));
    }
    if cfg.retry_budget < cfg.retry_delay {
        return Err(StateError::ConfigError(format!(
            "[checkpoint].retry_budget ({:?}) must not be shorter than retry_delay ({:?})",
            cfg.retry_budget, cfg.retry_delay
        )));
    }
    Ok(())
}

fn validate_prune(cfg: &PruneConfig) -> Result<()> {
    if cfg.retention.is_zero() {
        return Err(StateError::ConfigError(
            "[prune].retention must be greater than zero".to_string(),
        ));
    }
    if cfg.abort_age < cfg.retention {
        return Err(StateError::ConfigError(format!(
            "[prune].abort_age ({:?}) must not be shorter than retention ({:?})",
            cfg.abort_age, cfg.retention
        )));
    }
    if cfg.interval.is_zero() {
        return Err(StateError::ConfigError(
            "[prune].interval must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Parse strings like "50ms", "5s", "10m", "24h" or "7d".
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| format!("duration '{s}' is missing a unit suffix"))?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{unit}'; expected ms, s, m, h or d"
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
