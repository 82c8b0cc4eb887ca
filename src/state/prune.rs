// src/state/prune.rs

//! Garbage collection of old changes and tasks.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::state::state::State;

impl State {
    /// Sweep old records. Must be called with the lock held.
    ///
    /// - A change that is ready, and became ready at or before
    ///   `now - retention`, is removed together with its tasks.
    /// - A change that is not ready and was spawned at or before
    ///   `now - abort_age` has its pending tasks put on `Hold`. It is kept so
    ///   it can be inspected, and is removed by a later sweep once the
    ///   retention window has passed.
    /// - A task never added to a change and spawned at or before
    ///   `now - retention` is removed.
    ///
    /// Removed IDs are never handed out again. The state is only marked
    /// modified if something was removed or held.
    pub fn prune(&self, retention: Duration, abort_age: Duration) {
        let now = self.now();
        let prune_limit = cutoff(now, retention);
        let abort_limit = cutoff(now, abort_age);

        let mut data = self.locked_data();
        let mut touched = false;

        let mut change_ids: Vec<String> = data.changes.keys().cloned().collect();
        change_ids.sort_by(|a, b| crate::state::state::id_order(a, b));

        for id in change_ids {
            let (spawn_time, ready_time) = {
                let chg = data.change(&id);
                (chg.spawn_time, chg.ready_time)
            };

            // The ready time outlives readiness: a task added later or a
            // non-terminal override makes the change pending again.
            if data.change_status(&id).is_ready() {
                let expired = ready_time
                    .zip(prune_limit)
                    .is_some_and(|(ready, limit)| ready <= limit);
                if expired {
                    if let Some(chg) = data.changes.remove(&id) {
                        for tid in &chg.task_ids {
                            data.drop_task(tid);
                        }
                        info!(
                            change = %id,
                            kind = %chg.kind,
                            tasks = chg.task_ids.len(),
                            "pruned ready change"
                        );
                    }
                    touched = true;
                }
            } else if abort_limit.is_some_and(|limit| spawn_time <= limit) {
                warn!(
                    change = %id,
                    spawn_time = %spawn_time,
                    "change not ready after abort age; holding its tasks"
                );
                data.quarantine_change(&id, now);
                touched = true;
            }
        }

        let abandoned: Vec<String> = data
            .tasks
            .values()
            .filter(|t| t.change.is_none())
            .filter(|t| prune_limit.is_some_and(|limit| t.spawn_time <= limit))
            .map(|t| t.id.clone())
            .collect();
        for tid in abandoned {
            debug!(task = %tid, "pruned unlinked task");
            data.drop_task(&tid);
            touched = true;
        }

        drop(data);
        if touched {
            self.mark_modified();
        }
    }
}

/// `now - window`, or `None` if that is not representable (nothing is that
/// old).
fn cutoff(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
}
