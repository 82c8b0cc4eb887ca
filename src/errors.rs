// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only recoverable conditions live here. Broken internal contracts (access
//! without the state lock, data bags that no longer decode, exhausted
//! checkpoint retries) are panics, see [`crate::state`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("no state entry for key {0:?}")]
    NoState(String),

    #[error("cannot abort change {0} with nothing pending")]
    ChangeReady(String),

    #[error("cannot find change with id {0:?}")]
    ChangeNotFound(String),

    #[error("unknown status {0:?}")]
    UnknownStatus(String),

    #[error("select should be one of: all,in-progress,ready (got {0:?})")]
    UnknownFilter(String),

    #[error("corrupted state: {0}")]
    Corrupt(String),

    #[error("wait cycle detected involving task {0}")]
    WaitCycle(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;
