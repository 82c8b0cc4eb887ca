// src/state/task.rs

//! Task handles.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::Result;
use crate::state::change::Change;
use crate::state::data;
use crate::state::ready::ReadySignal;
use crate::state::state::State;
use crate::state::status::Status;
use crate::state::taskset::TaskSet;

/// Handle to one task of a [`State`].
///
/// Every method requires the state lock. Two handles are equal when they
/// name the same task of the same state.
#[derive(Clone)]
pub struct Task {
    state: State,
    id: String,
}

impl Task {
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
        self.state.reading().task(&self.id).kind.clone()
    }

    pub fn summary(&self) -> String {
        self.state.reading().task(&self.id).summary.clone()
    }

    /// Current status; an unset status reads as [`Status::Do`].
    pub fn status(&self) -> Status {
        self.state.reading().task(&self.id).status.effective()
    }

    /// Set the status. The first terminal status records the ready time,
    /// raises the readiness signal and may make the owning change ready.
    pub fn set_status(&self, status: Status) {
        let now = self.state.now();
        self.state
            .writing()
            .set_task_status(&self.id, status, now);
    }

    /// Owning change, or `None` while unlinked.
    pub fn change(&self) -> Option<Change> {
        let chg = self.state.reading().task(&self.id).change.clone();
        chg.map(|id| Change::new(self.state.clone(), id))
    }

    pub fn spawn_time(&self) -> DateTime<Utc> {
        self.state.reading().task(&self.id).spawn_time
    }

    /// When the task first reached a terminal status.
    pub fn ready_time(&self) -> Option<DateTime<Utc>> {
        self.state.reading().task(&self.id).ready_time
    }

    pub fn ready(&self) -> ReadySignal {
        self.state.reading().task(&self.id).ready.subscribe()
    }

    /// `(done, total)`. Without explicit progress a task counts as one unit,
    /// done once terminal.
    pub fn progress(&self) -> (u64, u64) {
        let data = self.state.reading();
        let task = data.task(&self.id);
        match task.progress {
            Some(p) => p,
            None if task.status.is_ready() => (1, 1),
            None => (0, 1),
        }
    }

    pub fn set_progress(&self, done: u64, total: u64) {
        self.state.writing().task_mut(&self.id).progress = Some((done, total));
    }

    /// Log lines, oldest first.
    pub fn log(&self) -> Vec<String> {
        self.state.reading().task(&self.id).log.clone()
    }

    pub fn log_info(&self, msg: impl fmt::Display) {
        self.append_log("INFO", msg);
    }

    pub fn log_error(&self, msg: impl fmt::Display) {
        self.append_log("ERROR", msg);
    }

    fn append_log(&self, level: &str, msg: impl fmt::Display) {
        let now = self.state.now();
        let line = format!(
            "{} {level} {msg}",
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        self.state.writing().task_mut(&self.id).log.push(line);
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.state.ensure_locked();
        let owner = format!("task {} data entry", self.id);
        let value = data::encode(&owner, key, value);
        self.state
            .writing()
            .task_mut(&self.id)
            .data
            .insert_raw(key, value);
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw = self.state.reading().task(&self.id).data.raw(key).cloned();
        data::decode(&format!("task {} data entry", self.id), key, raw)
    }

    /// Make this task wait for `other`. `other` sees this task in its
    /// [`halt_tasks`](Task::halt_tasks) immediately.
    pub fn wait_for(&self, other: &Task) {
        self.check_same_state(other);
        let mut data = self.state.writing();
        // Both ends must exist.
        data.task(&other.id);
        data.task(&self.id);
        data.graph.add_edge(&self.id, &other.id);
    }

    pub fn wait_all(&self, ts: &TaskSet) {
        for t in ts.tasks() {
            self.wait_for(t);
        }
    }

    /// Tasks this task waits for, in the order they were added.
    pub fn wait_tasks(&self) -> Vec<Task> {
        let data = self.state.reading();
        data.graph
            .waits_of(&self.id)
            .iter()
            .map(|id| Task::new(self.state.clone(), id.clone()))
            .collect()
    }

    /// Tasks waiting for this task.
    pub fn halt_tasks(&self) -> Vec<Task> {
        let data = self.state.reading();
        data.graph
            .halts_of(&self.id)
            .iter()
            .map(|id| Task::new(self.state.clone(), id.clone()))
            .collect()
    }

    /// Order `tasks` so each comes after the tasks it waits for.
    ///
    /// Only waits among `tasks` are considered. Fails with
    /// [`StateError::WaitCycle`](crate::errors::StateError::WaitCycle) if
    /// they form a cycle.
    pub fn in_wait_order(tasks: &[Task]) -> Result<Vec<Task>> {
        let Some(first) = tasks.first() else {
            return Ok(Vec::new());
        };
        for t in tasks {
            first.check_same_state(t);
        }
        let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
        let ordered = first.state.reading().graph.order(&ids)?;
        Ok(ordered
            .into_iter()
            .map(|id| Task::new(first.state.clone(), id))
            .collect())
    }

    pub(crate) fn check_same_state(&self, other: &Task) {
        if !self.state.same(&other.state) {
            panic!(
                "internal error: task {} and task {} belong to different states",
                self.id, other.id
            );
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.state.same(&other.state)
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("id", &self.id).finish()
    }
}
