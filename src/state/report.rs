// src/state/report.rs

//! Read-only views of changes for display and for API layers.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::errors::{Result, StateError};
use crate::state::change::Change;
use crate::state::state::State;
use crate::state::task::Task;

/// Change data entry surfaced as [`ChangeInfo::data`].
pub const API_DATA_KEY: &str = "api-data";

/// Which changes to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeFilter {
    All,
    #[default]
    InProgress,
    Ready,
}

impl ChangeFilter {
    pub fn matches(self, chg: &Change) -> bool {
        match self {
            ChangeFilter::All => true,
            ChangeFilter::InProgress => !chg.status().is_ready(),
            ChangeFilter::Ready => chg.status().is_ready(),
        }
    }
}

impl FromStr for ChangeFilter {
    type Err = StateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ChangeFilter::All),
            "" | "in-progress" => Ok(ChangeFilter::InProgress),
            "ready" => Ok(ChangeFilter::Ready),
            _ => Err(StateError::UnknownFilter(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChangeInfo {
    pub id: String,
    pub kind: String,
    pub summary: String,
    pub status: String,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    pub spawn_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<TaskInfo>,
    /// The change's `api-data` entry, for clients that attached one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TaskInfo {
    pub id: String,
    pub kind: String,
    pub summary: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<String>,
    pub progress: ProgressInfo,
    pub spawn_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressInfo {
    pub done: u64,
    pub total: u64,
}

impl ChangeInfo {
    /// Snapshot `chg`. Requires the state lock.
    pub fn from_change(chg: &Change) -> Self {
        let status = chg.status();
        Self {
            id: chg.id().to_string(),
            kind: chg.kind(),
            summary: chg.summary(),
            status: status.to_string(),
            ready: status.is_ready(),
            err: chg.err(),
            spawn_time: chg.spawn_time(),
            ready_time: chg.ready_time(),
            tasks: chg.tasks().iter().map(TaskInfo::from_task).collect(),
            data: chg.get::<Value>(API_DATA_KEY).ok(),
        }
    }
}

impl TaskInfo {
    pub fn from_task(t: &Task) -> Self {
        let (done, total) = t.progress();
        Self {
            id: t.id().to_string(),
            kind: t.kind(),
            summary: t.summary(),
            status: t.status().to_string(),
            log: t.log(),
            progress: ProgressInfo { done, total },
            spawn_time: t.spawn_time(),
            ready_time: t.ready_time(),
        }
    }
}

impl State {
    /// Views of the changes selected by `filter`, in creation order.
    pub fn change_infos(&self, filter: ChangeFilter) -> Vec<ChangeInfo> {
        self.changes()
            .iter()
            .filter(|chg| filter.matches(chg))
            .map(ChangeInfo::from_change)
            .collect()
    }

    /// View of one change.
    pub fn change_info(&self, id: &str) -> Result<ChangeInfo> {
        self.change(id)
            .map(|chg| ChangeInfo::from_change(&chg))
            .ok_or_else(|| StateError::ChangeNotFound(id.to_string()))
    }
}
