// tests/abort_and_report.rs

mod common;
use crate::common::{ChangeBuilder, fixture};

use overlord::state::API_DATA_KEY;
use overlord::{ChangeFilter, ChangeInfo, StateError, Status};

#[test]
fn abort_holds_pending_tasks_only() {
    let f = fixture();
    let st = &f.state;
    st.lock();

    let chg = ChangeBuilder::new("install", "Install core")
        .task_with_status("download", "Download", Status::Done)
        .task_with_status("mount", "Mount", Status::Doing)
        .task("link", "Link")
        .chained()
        .build(st);

    chg.abort().unwrap();

    let statuses: Vec<Status> = chg.tasks().iter().map(|t| t.status()).collect();
    assert_eq!(statuses, [Status::Done, Status::Hold, Status::Hold]);
    assert_eq!(chg.status(), Status::Hold);
    assert!(chg.ready().is_set());
    assert_eq!(st.num_task(), 3, "abort deletes nothing");
    st.unlock();
}

#[test]
fn abort_of_ready_change_is_rejected() {
    let f = fixture();
    let st = &f.state;
    st.lock();

    let chg = ChangeBuilder::new("install", "Install core")
        .task_with_status("download", "Download", Status::Done)
        .build(st);
    st.unlock();

    st.lock();
    let err = chg.abort().unwrap_err();
    assert!(matches!(err, StateError::ChangeReady(ref id) if id == "1"));
    assert_eq!(err.to_string(), "cannot abort change 1 with nothing pending");
    assert!(!st.modified());
    st.unlock();
}

#[test]
fn filter_parsing() {
    assert_eq!("all".parse::<ChangeFilter>().unwrap(), ChangeFilter::All);
    assert_eq!("".parse::<ChangeFilter>().unwrap(), ChangeFilter::InProgress);
    assert_eq!(
        "in-progress".parse::<ChangeFilter>().unwrap(),
        ChangeFilter::InProgress
    );
    assert_eq!("Ready".parse::<ChangeFilter>().unwrap(), ChangeFilter::Ready);
    assert!(matches!(
        "done".parse::<ChangeFilter>(),
        Err(StateError::UnknownFilter(_))
    ));
}

#[test]
fn change_infos_follow_filter() {
    let f = fixture();
    let st = &f.state;
    st.lock();

    ChangeBuilder::new("install", "Running")
        .task_with_status("download", "Download", Status::Doing)
        .build(st);
    ChangeBuilder::new("remove", "Failed")
        .task_with_status("unlink", "Unlink", Status::Error)
        .build(st);

    let all = st.change_infos(ChangeFilter::All);
    assert_eq!(all.len(), 2);

    let pending = st.change_infos(ChangeFilter::InProgress);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].summary, "Running");
    assert!(!pending[0].ready);

    let ready = st.change_infos(ChangeFilter::Ready);
    assert_eq!(ready.len(), 1);
    assert_eq!(ready[0].status, "Error");
    assert_eq!(
        ready[0].err.as_deref(),
        Some("cannot perform the following tasks:\n- Unlink")
    );
    assert_eq!(ready[0].tasks[0].progress.done, 1);

    let json = serde_json::to_value(&ready[0]).unwrap();
    assert_eq!(json["kind"], "remove");
    assert!(json.get("spawn-time").is_some());
    assert!(json.get("ready-time").is_some());

    assert!(matches!(
        st.change_info("99"),
        Err(StateError::ChangeNotFound(ref id)) if id == "99"
    ));
    assert_eq!(st.change_info("1").unwrap().tasks.len(), 1);
    st.unlock();
}

#[test]
fn change_info_carries_api_data() {
    let f = fixture();
    let st = &f.state;
    st.lock();

    let plain = ChangeBuilder::new("refresh", "Refresh").build(st);
    let chg = ChangeBuilder::new("install", "Install core")
        .task("download", "Download")
        .build(st);
    chg.set(API_DATA_KEY, &serde_json::json!({ "snap-name": "core" }));

    let info = ChangeInfo::from_change(&chg);
    assert_eq!(info.data, Some(serde_json::json!({ "snap-name": "core" })));
    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["data"]["snap-name"], "core");

    let bare = ChangeInfo::from_change(&plain);
    assert_eq!(bare.data, None);
    assert!(serde_json::to_value(&bare).unwrap().get("data").is_none());
    st.unlock();
}
