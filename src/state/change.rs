// src/state/change.rs

//! Change handles.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::errors::{Result, StateError};
use crate::state::data;
use crate::state::ready::ReadySignal;
use crate::state::state::State;
use crate::state::status::Status;
use crate::state::task::Task;
use crate::state::taskset::TaskSet;

/// Handle to one change of a [`State`].
///
/// Every method requires the state lock.
#[derive(Clone)]
pub struct Change {
    state: State,
    id: String,
}

impl Change {
    pub(crate) fn new(state: State, id: String) -> Self {
        Self { state, id }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> String {
        self.state.reading().change(&self.id).kind.clone()
    }

    pub fn summary(&self) -> String {
        self.state.reading().change(&self.id).summary.clone()
    }

    /// The override set with [`set_status`](Change::set_status), or the
    /// status aggregated from the change's tasks.
    ///
    /// Aggregation picks the first status present in this order: `Doing`,
    /// `Undoing`, `Abort`, `Undo`, `Do`, `Error`, `Undone`, `Hold`, `Done`.
    /// A change without tasks reports `Do`.
    pub fn status(&self) -> Status {
        self.state.reading().change_status(&self.id)
    }

    /// Override the aggregated status. `Status::Default` clears the override.
    pub fn set_status(&self, status: Status) {
        let now = self.state.now();
        let mut data = self.state.writing();
        data.change_mut(&self.id).status = status;
        data.refresh_change_ready(&self.id, now);
    }

    pub fn spawn_time(&self) -> DateTime<Utc> {
        self.state.reading().change(&self.id).spawn_time
    }

    /// When the change first became terminal.
    pub fn ready_time(&self) -> Option<DateTime<Utc>> {
        self.state.reading().change(&self.id).ready_time
    }

    pub fn ready(&self) -> ReadySignal {
        self.state.reading().change(&self.id).ready.subscribe()
    }

    /// Link `task` to this change.
    ///
    /// A task belongs to one change for its whole life; linking it to a
    /// second change panics. Linking it again to the same change does
    /// nothing.
    pub fn add_task(&self, task: &Task) {
        if !self.state.same(task.state()) {
            panic!(
                "internal error: cannot add task {} to change {}: task belongs to another state",
                task.id(),
                self.id
            );
        }

        let now = self.state.now();
        let mut data = self.state.writing();
        data.change(&self.id);
        let t = data.task_mut(task.id());
        if let Some(owner) = t.change.clone() {
            if owner == self.id {
                return;
            }
            panic!(
                "internal error: cannot add task {} to change {}: task already in change {owner}",
                task.id(),
                self.id
            );
        }
        t.change = Some(self.id.clone());
        data.change_mut(&self.id)
            .task_ids
            .push(task.id().to_string());
        data.refresh_change_ready(&self.id, now);
    }

    pub fn add_all(&self, ts: &TaskSet) {
        for t in ts.tasks() {
            self.add_task(t);
        }
    }

    /// Tasks of this change, in the order they were added.
    pub fn tasks(&self) -> Vec<Task> {
        let data = self.state.reading();
        data.change(&self.id)
            .task_ids
            .iter()
            .map(|id| Task::new(self.state.clone(), id.clone()))
            .collect()
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.state.ensure_locked();
        let owner = format!("change {} data entry", self.id);
        let value = data::encode(&owner, key, value);
        self.state
            .writing()
            .change_mut(&self.id)
            .data
            .insert_raw(key, value);
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw = self
            .state
            .reading()
            .change(&self.id)
            .data
            .raw(key)
            .cloned();
        data::decode(&format!("change {} data entry", self.id), key, raw)
    }

    /// Summary of failed tasks, or `None` unless the change is in `Error`.
    pub fn err(&self) -> Option<String> {
        let data = self.state.reading();
        if data.change_status(&self.id) != Status::Error {
            return None;
        }

        let mut msg = String::from("cannot perform the following tasks:");
        for tid in &data.change(&self.id).task_ids {
            let Some(task) = data.tasks.get(tid) else {
                continue;
            };
            if task.status != Status::Error {
                continue;
            }
            msg.push_str("\n- ");
            msg.push_str(&task.summary);
            let last_error = task
                .log
                .iter()
                .rev()
                .find_map(|line| error_message(line));
            if let Some(reason) = last_error {
                msg.push_str(" (");
                msg.push_str(reason);
                msg.push(')');
            }
        }
        Some(msg)
    }

    /// Cancel the change: every task not yet terminal is put on `Hold`.
    ///
    /// Nothing is deleted and running work is not interrupted; whoever runs
    /// the tasks must notice the new status. Fails for a change that is
    /// already ready.
    pub fn abort(&self) -> Result<()> {
        if self.state.reading().change_status(&self.id).is_ready() {
            return Err(StateError::ChangeReady(self.id.clone()));
        }

        let now = self.state.now();
        self.state.writing().quarantine_change(&self.id, now);
        info!(change = %self.id, "change aborted");
        Ok(())
    }
}

/// Message of an `ERROR` log line; lines are `<time> <LEVEL> <message>`.
fn error_message(line: &str) -> Option<&str> {
    let (_time, rest) = line.split_once(' ')?;
    rest.strip_prefix("ERROR ")
}

impl PartialEq for Change {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.state.same(&other.state)
    }
}

impl Eq for Change {}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Change").field("id", &self.id).finish()
    }
}
