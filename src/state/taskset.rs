// src/state/taskset.rs

use crate::state::task::Task;

/// An ordered group of tasks built together, e.g. all steps of one install.
///
/// Work-construction code returns a `TaskSet`; callers chain sets with
/// [`TaskSet::wait_all`] and link them with
/// [`Change::add_all`](crate::state::Change::add_all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSet {
    tasks: Vec<Task>,
}

impl TaskSet {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn add_task(&mut self, task: Task) {
        if !self.tasks.contains(&task) {
            self.tasks.push(task);
        }
    }

    pub fn add_all(&mut self, other: &TaskSet) {
        for t in &other.tasks {
            self.add_task(t.clone());
        }
    }

    /// Make every task in the set wait for `task`.
    pub fn wait_for(&self, task: &Task) {
        for t in &self.tasks {
            t.wait_for(task);
        }
    }

    /// Make every task in the set wait for every task in `other`.
    pub fn wait_all(&self, other: &TaskSet) {
        for t in &self.tasks {
            t.wait_all(other);
        }
    }
}

impl From<Vec<Task>> for TaskSet {
    fn from(tasks: Vec<Task>) -> Self {
        Self::new(tasks)
    }
}
