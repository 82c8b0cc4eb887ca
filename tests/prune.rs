// tests/prune.rs

mod common;
use crate::common::{ChangeBuilder, fixture};

use std::time::Duration;

use overlord::Status;

const HOUR: Duration = Duration::from_secs(60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn prune_scenarios() {
    let f = fixture();
    let st = &f.state;
    st.lock();

    // T-4h: a change that never finished.
    let stuck = ChangeBuilder::new("install", "Stuck install")
        .task_with_status("download", "Download", Status::Done)
        .task_with_status("link", "Link", Status::Doing)
        .task("setup", "Setup")
        .build(st);

    // T-2h: a change that finished right away.
    f.clock.advance(2 * HOUR);
    let finished = ChangeBuilder::new("remove", "Finished remove")
        .task_with_status("unlink", "Unlink", Status::Done)
        .build(st);
    let finished_tasks: Vec<String> = finished.tasks().iter().map(|t| t.id().to_string()).collect();
    assert!(finished.ready_time().is_some());

    // T-30m: a change still in flight.
    f.clock.advance(90 * MINUTE);
    let fresh = ChangeBuilder::new("refresh", "Fresh refresh")
        .task("download", "Download")
        .build(st);

    f.clock.advance(30 * MINUTE);
    st.unlock();
    assert!(!st.modified());

    st.lock();
    st.prune(HOUR, 3 * HOUR);
    assert!(st.modified());

    // Deleted with its tasks.
    assert!(st.change(finished.id()).is_none());
    for tid in &finished_tasks {
        assert!(st.task(tid).is_none());
    }

    // Quarantined but kept.
    let stuck = st.change(stuck.id()).expect("stuck change is kept");
    let statuses: Vec<Status> = stuck.tasks().iter().map(|t| t.status()).collect();
    assert_eq!(statuses, [Status::Done, Status::Hold, Status::Hold]);
    assert_eq!(stuck.status(), Status::Hold);
    assert!(stuck.ready().is_set());

    // Untouched.
    let fresh = st.change(fresh.id()).expect("fresh change is kept");
    assert_eq!(fresh.status(), Status::Do);

    assert_eq!(st.num_task(), 4);
    st.unlock();
}

#[test]
fn quarantined_change_is_removed_after_retention() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    let stuck = ChangeBuilder::new("install", "Stuck")
        .task("download", "Download")
        .build(st);

    f.clock.advance(4 * HOUR);
    st.prune(HOUR, 3 * HOUR);
    assert_eq!(stuck.status(), Status::Hold);
    assert_eq!(stuck.ready_time(), Some(common::epoch() + chrono::Duration::hours(4)));

    f.clock.advance(30 * MINUTE);
    st.prune(HOUR, 3 * HOUR);
    assert!(st.change(stuck.id()).is_some());

    f.clock.advance(30 * MINUTE);
    st.prune(HOUR, 3 * HOUR);
    assert!(st.change(stuck.id()).is_none());
    assert_eq!(st.num_task(), 0);
    st.unlock();
}

#[test]
fn quarantine_without_tasks_overrides_the_change() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    let empty = st.new_change("install", "Empty");
    let overridden = ChangeBuilder::new("install", "Overridden")
        .task("download", "Download")
        .status(Status::Doing)
        .build(st);

    f.clock.advance(4 * HOUR);
    st.prune(HOUR, 3 * HOUR);

    assert_eq!(empty.status(), Status::Hold);
    assert_eq!(overridden.status(), Status::Hold);
    assert_eq!(overridden.tasks()[0].status(), Status::Hold);
    assert!(empty.ready().is_set());
    st.unlock();
}

#[test]
fn unlinked_tasks_are_swept_after_retention() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    st.new_task("download", "Abandoned");
    let chg = st.new_change("install", "Kept");

    f.clock.advance(30 * MINUTE);
    st.prune(HOUR, 3 * HOUR);
    assert_eq!(st.num_task(), 1);

    f.clock.advance(HOUR);
    st.prune(HOUR, 3 * HOUR);
    assert_eq!(st.num_task(), 0);
    assert!(st.change(chg.id()).is_some());
    st.unlock();
}

#[test]
fn nothing_to_prune_leaves_state_clean() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    ChangeBuilder::new("install", "Young")
        .task("download", "Download")
        .build(st);
    st.unlock();

    st.lock();
    f.clock.advance(MINUTE);
    st.prune(HOUR, 3 * HOUR);
    assert!(!st.modified());
    st.unlock();
    assert_eq!(f.backend.checkpoints().len(), 1);
}

#[test]
fn pruned_ids_are_never_reused() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    ChangeBuilder::new("install", "Done")
        .task_with_status("download", "Download", Status::Done)
        .build(st);
    f.clock.advance(2 * HOUR);
    st.prune(HOUR, 3 * HOUR);
    assert!(st.changes().is_empty());
    st.unlock();

    let r = f.reload();
    r.state.lock();
    assert_eq!(r.state.new_change("install", "Again").id(), "3");
    r.state.unlock();
}

#[test]
fn change_pending_again_after_new_task_is_kept() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    let chg = ChangeBuilder::new("install", "Install core")
        .task_with_status("download", "Download", Status::Done)
        .build(st);
    assert!(chg.ready_time().is_some());

    let late = st.new_task("link", "Link");
    chg.add_task(&late);
    assert_eq!(chg.status(), Status::Do);

    f.clock.advance(2 * HOUR);
    st.prune(HOUR, 3 * HOUR);
    let chg = st.change(chg.id()).expect("pending change is kept");
    assert_eq!(chg.tasks().len(), 2);
    assert_eq!(late.status(), Status::Do);

    // Past the abort age it is held like any other stuck change.
    f.clock.advance(2 * HOUR);
    st.prune(HOUR, 3 * HOUR);
    assert_eq!(late.status(), Status::Hold);
    assert_eq!(chg.status(), Status::Hold);
    st.unlock();
}

#[test]
fn change_overridden_back_to_doing_is_kept() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    let chg = ChangeBuilder::new("install", "Install core")
        .task("download", "Download")
        .build(st);
    chg.set_status(Status::Done);
    assert!(chg.ready_time().is_some());
    chg.set_status(Status::Doing);

    f.clock.advance(2 * HOUR);
    st.prune(HOUR, 3 * HOUR);
    let chg = st.change(chg.id()).expect("doing change is kept");
    assert_eq!(chg.status(), Status::Doing);
    assert_eq!(st.num_task(), 1);
    st.unlock();
}
