// src/state/state.rs

//! The state container.
//!
//! All changes, tasks and entries live in one [`State`] guarded by one coarse
//! lock taken with [`State::lock`] and released with [`State::unlock`].
//! Every accessor, on the state and on the [`Change`]/[`Task`] handles it
//! hands out, first checks that the lock is held and panics otherwise.
//! Releasing a modified state writes a checkpoint through the [`Backend`]
//! before returning.

use std::collections::HashMap;
use std::hash::Hash;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::Backend;
use crate::clock::{Clock, SystemClock};
use crate::errors::Result;
use crate::state::cache::Cache;
use crate::state::change::Change;
use crate::state::checkpoint::{RetryPolicy, checkpoint_with_retry};
use crate::state::data::{self, DataBag};
use crate::state::graph::WaitGraph;
use crate::state::persist;
use crate::state::ready::ReadyFlag;
use crate::state::status::{self, Status};
use crate::state::task::Task;

pub(crate) const LOCK_FAULT: &str = "internal error: accessing state without lock";

/// Construction options for a [`State`].
#[derive(Clone)]
pub struct StateOptions {
    pub retry: RetryPolicy,
    pub clock: Arc<dyn Clock>,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl std::fmt::Debug for StateOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateOptions")
            .field("retry", &self.retry)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Per-change record held by the state.
#[derive(Debug)]
pub(crate) struct ChangeData {
    pub id: String,
    pub kind: String,
    pub summary: String,
    /// Explicit override; `Default` means "derive from tasks".
    pub status: Status,
    pub data: DataBag,
    pub task_ids: Vec<String>,
    pub spawn_time: DateTime<Utc>,
    pub ready_time: Option<DateTime<Utc>>,
    pub ready: ReadyFlag,
}

/// Per-task record held by the state.
#[derive(Debug)]
pub(crate) struct TaskData {
    pub id: String,
    pub kind: String,
    pub summary: String,
    pub status: Status,
    pub data: DataBag,
    pub log: Vec<String>,
    pub progress: Option<(u64, u64)>,
    pub spawn_time: DateTime<Utc>,
    pub ready_time: Option<DateTime<Utc>>,
    /// Owning change; `None` until linked, never reassigned after.
    pub change: Option<String>,
    pub ready: ReadyFlag,
}

/// Everything behind the data mutex.
#[derive(Debug, Default)]
pub(crate) struct StateData {
    pub last_id: u64,
    pub entries: DataBag,
    pub changes: HashMap<String, ChangeData>,
    pub tasks: HashMap<String, TaskData>,
    pub graph: WaitGraph,
    pub cache: Cache,
}

impl StateData {
    pub fn next_id(&mut self) -> String {
        self.last_id += 1;
        self.last_id.to_string()
    }

    pub fn change(&self, id: &str) -> &ChangeData {
        match self.changes.get(id) {
            Some(chg) => chg,
            None => panic!("internal error: change {id} is not in state"),
        }
    }

    pub fn change_mut(&mut self, id: &str) -> &mut ChangeData {
        match self.changes.get_mut(id) {
            Some(chg) => chg,
            None => panic!("internal error: change {id} is not in state"),
        }
    }

    pub fn task(&self, id: &str) -> &TaskData {
        match self.tasks.get(id) {
            Some(t) => t,
            None => panic!("internal error: task {id} is not in state"),
        }
    }

    pub fn task_mut(&mut self, id: &str) -> &mut TaskData {
        match self.tasks.get_mut(id) {
            Some(t) => t,
            None => panic!("internal error: task {id} is not in state"),
        }
    }

    /// Override if set, otherwise aggregated from the change's tasks.
    pub fn change_status(&self, id: &str) -> Status {
        let chg = self.change(id);
        if chg.status != Status::Default {
            return chg.status;
        }
        status::aggregate(
            chg.task_ids
                .iter()
                .filter_map(|tid| self.tasks.get(tid))
                .map(|t| t.status),
        )
    }

    /// Record the ready time and raise the signal the first time the change
    /// is terminal.
    pub fn refresh_change_ready(&mut self, id: &str, now: DateTime<Utc>) {
        let ready = self.change_status(id).is_ready();
        let chg = self.change_mut(id);
        if ready && !chg.ready.is_set() {
            chg.ready_time.get_or_insert(now);
            chg.ready.set();
            debug!(change = %id, "change is ready");
        }
    }

    pub fn set_task_status(&mut self, id: &str, status: Status, now: DateTime<Utc>) {
        let task = self.task_mut(id);
        task.status = status;
        if status.is_ready() && !task.ready.is_set() {
            task.ready_time.get_or_insert(now);
            task.ready.set();
        }
        if let Some(chg) = task.change.clone() {
            self.refresh_change_ready(&chg, now);
        }
    }

    /// Move every non-terminal task of a change to `Hold`, and the change
    /// itself when the tasks alone would not make it terminal.
    pub fn quarantine_change(&mut self, id: &str, now: DateTime<Utc>) {
        let task_ids = self.change(id).task_ids.clone();
        for tid in &task_ids {
            let pending = self
                .tasks
                .get(tid)
                .is_some_and(|t| !t.status.effective().is_ready());
            if pending {
                self.set_task_status(tid, Status::Hold, now);
            }
        }

        let chg = self.change_mut(id);
        if chg.status != Status::Default || task_ids.is_empty() {
            chg.status = Status::Hold;
        }
        self.refresh_change_ready(id, now);
    }

    /// Remove a task from the registry and the wait relation.
    pub fn drop_task(&mut self, id: &str) {
        self.tasks.remove(id);
        self.graph.remove_task(id);
    }
}

pub(crate) struct Inner {
    /// Held marker for the coarse lock.
    held: Mutex<bool>,
    released: Condvar,
    modified: AtomicBool,
    data: Mutex<StateData>,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

/// The state container. Clones refer to the same state.
#[derive(Clone)]
pub struct State {
    inner: Arc<Inner>,
}

impl State {
    /// Create an empty state bound to `backend`.
    ///
    /// A new state counts as modified, so the first `unlock` writes an
    /// initial checkpoint.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::with_options(backend, StateOptions::default())
    }

    pub fn with_options(backend: impl Backend + 'static, options: StateOptions) -> Self {
        Self::from_parts(Arc::new(backend), options, StateData::default(), true)
    }

    /// Rehydrate a state from a document previously handed to
    /// [`Backend::checkpoint`].
    pub fn read_state(backend: impl Backend + 'static, reader: impl Read) -> Result<Self> {
        Self::read_state_with(backend, StateOptions::default(), reader)
    }

    pub fn read_state_with(
        backend: impl Backend + 'static,
        options: StateOptions,
        mut reader: impl Read,
    ) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let data = persist::decode(&bytes)?;
        debug!(
            changes = data.changes.len(),
            tasks = data.tasks.len(),
            last_id = data.last_id,
            "state loaded"
        );
        Ok(Self::from_parts(Arc::new(backend), options, data, false))
    }

    fn from_parts(
        backend: Arc<dyn Backend>,
        options: StateOptions,
        data: StateData,
        modified: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                held: Mutex::new(false),
                released: Condvar::new(),
                modified: AtomicBool::new(modified),
                data: Mutex::new(data),
                backend,
                clock: options.clock,
                retry: options.retry,
            }),
        }
    }

    /// Acquire the state lock, blocking while another caller holds it.
    ///
    /// The lock is not reentrant.
    pub fn lock(&self) {
        let mut held = self.inner.held.lock();
        while *held {
            self.inner.released.wait(&mut held);
        }
        *held = true;
    }

    /// Release the state lock, checkpointing first if anything changed.
    ///
    /// A failing backend is retried per the [`RetryPolicy`]; if the budget
    /// runs out this panics and the lock stays held.
    pub fn unlock(&self) {
        self.ensure_locked();

        if self.inner.modified.load(Ordering::Acquire) {
            let bytes = persist::encode(&self.inner.data.lock());
            checkpoint_with_retry(self.inner.backend.as_ref(), &self.inner.retry, &bytes);
            self.inner.modified.store(false, Ordering::Release);
        }

        let mut held = self.inner.held.lock();
        *held = false;
        self.inner.released.notify_one();
    }

    /// Whether the state changed since the last checkpoint. Needs no lock.
    pub fn modified(&self) -> bool {
        self.inner.modified.load(Ordering::Acquire)
    }

    /// Ask the backend's control loop to run again within `d`. Needs no lock.
    pub fn ensure_before(&self, d: Duration) {
        self.inner.backend.ensure_before(d);
    }

    /// Store `value` under `key`.
    ///
    /// Panics if `value` cannot be encoded.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.ensure_locked();
        let value = data::encode("state entry", key, value);
        self.writing().entries.insert_raw(key, value);
    }

    /// Remove the entry under `key`, if any.
    pub fn remove(&self, key: &str) {
        let mut data = self.locked_data();
        if data.entries.remove(key) {
            self.mark_modified();
        }
    }

    /// Decode the entry under `key`.
    ///
    /// Returns [`StateError::NoState`](crate::errors::StateError::NoState)
    /// when absent; panics when the stored value does not fit `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let raw = self.reading().entries.raw(key).cloned();
        data::decode("state entry", key, raw)
    }

    /// Keep `value` under `key` in the ephemeral cache. Not persisted.
    pub fn cache<K, V>(&self, key: K, value: V)
    where
        K: Hash + Eq + Send + 'static,
        V: Send + 'static,
    {
        self.reading().cache.insert(key, value);
    }

    pub fn uncache<K>(&self, key: &K)
    where
        K: Hash + Eq + Send + 'static,
    {
        self.reading().cache.remove(key);
    }

    /// Cached value under `key`, if present with type `V`.
    pub fn cached<K, V>(&self, key: &K) -> Option<V>
    where
        K: Hash + Eq + Send + 'static,
        V: Clone + 'static,
    {
        self.reading().cache.get(key)
    }

    /// Create a change. It is visible to [`State::changes`] right away.
    pub fn new_change(&self, kind: &str, summary: &str) -> Change {
        let now = self.now();
        let mut data = self.writing();
        let id = data.next_id();
        data.changes.insert(
            id.clone(),
            ChangeData {
                id: id.clone(),
                kind: kind.to_string(),
                summary: summary.to_string(),
                status: Status::Default,
                data: DataBag::new(),
                task_ids: Vec::new(),
                spawn_time: now,
                ready_time: None,
                ready: ReadyFlag::new(false),
            },
        );
        debug!(change = %id, kind, "new change");
        Change::new(self.clone(), id)
    }

    /// Create a task. It stays hidden from [`State::tasks`] and
    /// [`State::task`] until added to a change.
    pub fn new_task(&self, kind: &str, summary: &str) -> Task {
        let now = self.now();
        let mut data = self.writing();
        let id = data.next_id();
        data.tasks.insert(
            id.clone(),
            TaskData {
                id: id.clone(),
                kind: kind.to_string(),
                summary: summary.to_string(),
                status: Status::Default,
                data: DataBag::new(),
                log: Vec::new(),
                progress: None,
                spawn_time: now,
                ready_time: None,
                change: None,
                ready: ReadyFlag::new(false),
            },
        );
        debug!(task = %id, kind, "new task");
        Task::new(self.clone(), id)
    }

    /// Snapshot of all changes, in creation order.
    pub fn changes(&self) -> Vec<Change> {
        let data = self.reading();
        let mut ids: Vec<&String> = data.changes.keys().collect();
        ids.sort_by(|a, b| id_order(a, b));
        ids.into_iter()
            .map(|id| Change::new(self.clone(), id.clone()))
            .collect()
    }

    pub fn change(&self, id: &str) -> Option<Change> {
        let data = self.reading();
        data.changes
            .contains_key(id)
            .then(|| Change::new(self.clone(), id.to_string()))
    }

    /// Snapshot of all tasks linked to a change, in creation order.
    pub fn tasks(&self) -> Vec<Task> {
        let data = self.reading();
        let mut ids: Vec<&String> = data
            .tasks
            .values()
            .filter(|t| t.change.is_some())
            .map(|t| &t.id)
            .collect();
        ids.sort_by(|a, b| id_order(a, b));
        ids.into_iter()
            .map(|id| Task::new(self.clone(), id.clone()))
            .collect()
    }

    /// Task with `id`, if it exists and is linked to a change.
    pub fn task(&self, id: &str) -> Option<Task> {
        let data = self.reading();
        data.tasks
            .get(id)
            .filter(|t| t.change.is_some())
            .map(|_| Task::new(self.clone(), id.to_string()))
    }

    /// Number of tasks held, linked or not.
    pub fn num_task(&self) -> usize {
        self.reading().tasks.len()
    }

    /// The persisted document for the current contents.
    pub fn to_json(&self) -> Vec<u8> {
        persist::encode(&self.reading())
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub(crate) fn same(&self, other: &State) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn ensure_locked(&self) {
        if !*self.inner.held.lock() {
            panic!("{}", LOCK_FAULT);
        }
    }

    pub(crate) fn mark_modified(&self) {
        self.inner.modified.store(true, Ordering::Release);
    }

    /// Lock-checked access to the data.
    pub(crate) fn locked_data(&self) -> MutexGuard<'_, StateData> {
        self.ensure_locked();
        self.inner.data.lock()
    }

    pub(crate) fn reading(&self) -> MutexGuard<'_, StateData> {
        self.locked_data()
    }

    /// Lock-checked access that marks the state modified.
    pub(crate) fn writing(&self) -> MutexGuard<'_, StateData> {
        let data = self.locked_data();
        self.mark_modified();
        data
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("modified", &self.modified())
            .finish_non_exhaustive()
    }
}

/// Order decimal IDs numerically.
pub(crate) fn id_order(a: &str, b: &str) -> std::cmp::Ordering {
    (a.len(), a).cmp(&(b.len(), b))
}
