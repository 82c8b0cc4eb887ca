#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use overlord::{Change, State, Status, Task, TaskSet};

/// 2024-01-01T00:00:00Z, a fixed starting point for mock clocks.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid fixed timestamp")
}

/// Builder for a change and its tasks. `build` needs the state lock.
pub struct ChangeBuilder {
    kind: String,
    summary: String,
    tasks: Vec<TaskSpec>,
    chained: bool,
    status: Option<Status>,
}

struct TaskSpec {
    kind: String,
    summary: String,
    status: Option<Status>,
}

impl ChangeBuilder {
    pub fn new(kind: &str, summary: &str) -> Self {
        Self {
            kind: kind.to_string(),
            summary: summary.to_string(),
            tasks: Vec::new(),
            chained: false,
            status: None,
        }
    }

    pub fn task(mut self, kind: &str, summary: &str) -> Self {
        self.tasks.push(TaskSpec {
            kind: kind.to_string(),
            summary: summary.to_string(),
            status: None,
        });
        self
    }

    pub fn task_with_status(mut self, kind: &str, summary: &str, status: Status) -> Self {
        self.tasks.push(TaskSpec {
            kind: kind.to_string(),
            summary: summary.to_string(),
            status: Some(status),
        });
        self
    }

    /// Make every task wait for the one built before it.
    pub fn chained(mut self) -> Self {
        self.chained = true;
        self
    }

    /// Explicit status override for the change.
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self, st: &State) -> Change {
        let chg = st.new_change(&self.kind, &self.summary);
        let mut ts = TaskSet::default();
        let mut prev: Option<Task> = None;
        for spec in self.tasks {
            let t = st.new_task(&spec.kind, &spec.summary);
            if let Some(status) = spec.status {
                t.set_status(status);
            }
            if let (true, Some(p)) = (self.chained, prev.as_ref()) {
                t.wait_for(p);
            }
            prev = Some(t.clone());
            ts.add_task(t);
        }
        chg.add_all(&ts);
        if let Some(status) = self.status {
            chg.set_status(status);
        }
        chg
    }
}
