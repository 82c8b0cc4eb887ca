// src/state/persist.rs

//! The persisted state document.
//!
//! ```json
//! {
//!   "data": { "<key>": <value>, ... },
//!   "changes": { "<id>": { "id", "kind", "summary", "status"?, "data"?,
//!                          "task-ids", "spawn-time", "ready-time"? } },
//!   "tasks": { "<id>": { "id", "kind", "summary", "status"?, "data"?,
//!                        "wait-tasks"?, "log"?, "progress"?,
//!                        "spawn-time", "ready-time"? } },
//!   "last-id": <n>
//! }
//! ```
//!
//! Unknown fields are ignored on read. The `halts` side of the wait
//! relation, task-to-change back references and readiness signals are not
//! stored; they are rebuilt from the fields above.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StateError};
use crate::state::data::DataBag;
use crate::state::ready::ReadyFlag;
use crate::state::state::{ChangeData, StateData, TaskData, id_order};
use crate::state::status::Status;

#[derive(Debug, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    data: DataBag,
    #[serde(default)]
    changes: BTreeMap<String, ChangeRecord>,
    #[serde(default)]
    tasks: BTreeMap<String, TaskRecord>,
    #[serde(rename = "last-id", default)]
    last_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ChangeRecord {
    id: String,
    kind: String,
    summary: String,
    #[serde(default, skip_serializing_if = "is_default_status")]
    status: Status,
    #[serde(default, skip_serializing_if = "DataBag::is_empty")]
    data: DataBag,
    #[serde(default)]
    task_ids: Vec<String>,
    spawn_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ready_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct TaskRecord {
    id: String,
    kind: String,
    summary: String,
    #[serde(default, skip_serializing_if = "is_default_status")]
    status: Status,
    #[serde(default, skip_serializing_if = "DataBag::is_empty")]
    data: DataBag,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    wait_tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    log: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    progress: Option<ProgressRecord>,
    spawn_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ready_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ProgressRecord {
    done: u64,
    total: u64,
}

fn is_default_status(status: &Status) -> bool {
    *status == Status::Default
}

/// Serialize the whole state.
pub(crate) fn encode(data: &StateData) -> Vec<u8> {
    let doc = StateDocument {
        data: data.entries.clone(),
        changes: data
            .changes
            .values()
            .map(|chg| {
                (
                    chg.id.clone(),
                    ChangeRecord {
                        id: chg.id.clone(),
                        kind: chg.kind.clone(),
                        summary: chg.summary.clone(),
                        status: chg.status,
                        data: chg.data.clone(),
                        task_ids: chg.task_ids.clone(),
                        spawn_time: chg.spawn_time,
                        ready_time: chg.ready_time,
                    },
                )
            })
            .collect(),
        tasks: data
            .tasks
            .values()
            .map(|t| {
                (
                    t.id.clone(),
                    TaskRecord {
                        id: t.id.clone(),
                        kind: t.kind.clone(),
                        summary: t.summary.clone(),
                        status: t.status,
                        data: t.data.clone(),
                        wait_tasks: data.graph.waits_of(&t.id).to_vec(),
                        log: t.log.clone(),
                        progress: t.progress.map(|(done, total)| ProgressRecord { done, total }),
                        spawn_time: t.spawn_time,
                        ready_time: t.ready_time,
                    },
                )
            })
            .collect(),
        last_id: data.last_id,
    };

    match serde_json::to_vec(&doc) {
        Ok(bytes) => bytes,
        Err(e) => panic!("internal error: could not marshal state: {e}"),
    }
}

/// Rebuild state from a document produced by [`encode`].
pub(crate) fn decode(bytes: &[u8]) -> Result<StateData> {
    let doc: StateDocument = serde_json::from_slice(bytes)?;

    let mut data = StateData {
        last_id: doc.last_id,
        entries: doc.data,
        ..StateData::default()
    };

    let mut edges: Vec<(String, Vec<String>)> = Vec::new();
    for (key, rec) in doc.tasks {
        check_key("task", &key, &rec.id)?;
        bump_last_id(&mut data, &rec.id);
        if !rec.wait_tasks.is_empty() {
            edges.push((rec.id.clone(), rec.wait_tasks));
        }
        data.tasks.insert(
            rec.id.clone(),
            TaskData {
                id: rec.id,
                kind: rec.kind,
                summary: rec.summary,
                status: rec.status,
                data: rec.data,
                log: rec.log,
                progress: rec.progress.map(|p| (p.done, p.total)),
                spawn_time: rec.spawn_time,
                ready_time: rec.ready_time,
                change: None,
                ready: ReadyFlag::new(rec.status.is_ready()),
            },
        );
    }

    edges.sort_by(|a, b| id_order(&a.0, &b.0));
    for (waiter, targets) in edges {
        for target in targets {
            if !data.tasks.contains_key(&target) {
                return Err(StateError::Corrupt(format!(
                    "task {waiter} waits for unknown task {target}"
                )));
            }
            data.graph.add_edge(&waiter, &target);
        }
    }

    let mut change_ids = Vec::new();
    for (key, rec) in doc.changes {
        check_key("change", &key, &rec.id)?;
        bump_last_id(&mut data, &rec.id);
        for tid in &rec.task_ids {
            let Some(task) = data.tasks.get_mut(tid) else {
                return Err(StateError::Corrupt(format!(
                    "change {} references unknown task {tid}",
                    rec.id
                )));
            };
            if let Some(other) = &task.change {
                return Err(StateError::Corrupt(format!(
                    "task {tid} listed in changes {other} and {}",
                    rec.id
                )));
            }
            task.change = Some(rec.id.clone());
        }
        change_ids.push(rec.id.clone());
        data.changes.insert(
            rec.id.clone(),
            ChangeData {
                id: rec.id,
                kind: rec.kind,
                summary: rec.summary,
                status: rec.status,
                data: rec.data,
                task_ids: rec.task_ids,
                spawn_time: rec.spawn_time,
                ready_time: rec.ready_time,
                ready: ReadyFlag::new(false),
            },
        );
    }

    for id in change_ids {
        if data.change_status(&id).is_ready() {
            data.change(&id).ready.set();
        }
    }

    Ok(data)
}

fn check_key(what: &str, key: &str, id: &str) -> Result<()> {
    if key != id {
        return Err(StateError::Corrupt(format!(
            "{what} stored under {key:?} has id {id:?}"
        )));
    }
    Ok(())
}

/// Never hand out an ID that is already present, even if the stored counter
/// lags behind.
fn bump_last_id(data: &mut StateData, id: &str) {
    if let Ok(n) = id.parse::<u64>() {
        data.last_id = data.last_id.max(n);
    }
}
