// src/state/status.rs

//! Task and change status values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StateError;

/// Status of a task or change.
///
/// The set is closed. [`Status::is_ready`] splits it into terminal and
/// non-terminal values; nothing else about transitions is enforced here,
/// the subsystem driving execution sets statuses directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No explicit status. Tasks report it as [`Status::Do`]; on a change it
    /// means "derive from tasks".
    #[default]
    Default,
    /// Waiting to be run.
    Do,
    /// Being run.
    Doing,
    /// Ran successfully.
    Done,
    /// Asked to stop while running.
    Abort,
    /// Waiting to be undone.
    Undo,
    /// Being undone.
    Undoing,
    /// Undone successfully.
    Undone,
    /// Held back; will not run. Used for quarantine.
    Hold,
    /// Failed.
    Error,
}

/// Aggregation order for changes: the first status present among a change's
/// tasks wins. Non-terminal values come first so a change is only ready once
/// every task is.
pub(crate) const DOMINANCE: [Status; 9] = [
    Status::Doing,
    Status::Undoing,
    Status::Abort,
    Status::Undo,
    Status::Do,
    Status::Error,
    Status::Undone,
    Status::Hold,
    Status::Done,
];

impl Status {
    /// Whether the status is terminal.
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            Status::Done | Status::Undone | Status::Hold | Status::Error
        )
    }

    /// Status with `Default` folded into `Do`.
    pub(crate) fn effective(self) -> Status {
        match self {
            Status::Default => Status::Do,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Default => "Default",
            Status::Do => "Do",
            Status::Doing => "Doing",
            Status::Done => "Done",
            Status::Abort => "Abort",
            Status::Undo => "Undo",
            Status::Undoing => "Undoing",
            Status::Undone => "Undone",
            Status::Hold => "Hold",
            Status::Error => "Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(Status::Default),
            "do" => Ok(Status::Do),
            "doing" => Ok(Status::Doing),
            "done" => Ok(Status::Done),
            "abort" => Ok(Status::Abort),
            "undo" => Ok(Status::Undo),
            "undoing" => Ok(Status::Undoing),
            "undone" => Ok(Status::Undone),
            "hold" => Ok(Status::Hold),
            "error" => Ok(Status::Error),
            _ => Err(StateError::UnknownStatus(s.to_string())),
        }
    }
}

/// Aggregate status for a set of task statuses.
///
/// An empty set reports [`Status::Do`].
pub(crate) fn aggregate<I>(statuses: I) -> Status
where
    I: IntoIterator<Item = Status>,
{
    let mut seen = [false; DOMINANCE.len()];
    for status in statuses {
        let status = status.effective();
        if let Some(pos) = DOMINANCE.iter().position(|s| *s == status) {
            seen[pos] = true;
        }
    }

    DOMINANCE
        .iter()
        .zip(seen)
        .find_map(|(status, present)| present.then_some(*status))
        .unwrap_or(Status::Do)
}
