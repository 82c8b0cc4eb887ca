// tests/ready_signal.rs

mod common;
use crate::common::{ChangeBuilder, fixture};

use overlord::Status;
use overlord_test_utils::with_timeout;

#[tokio::test]
async fn waiters_wake_when_change_becomes_ready() {
    let f = fixture();
    let st = f.state.clone();
    st.lock();
    let chg = ChangeBuilder::new("install", "Install core")
        .task("download", "Download")
        .build(&st);
    let mut signal = chg.ready();
    let task = chg.tasks()[0].clone();
    st.unlock();

    assert!(!signal.is_set());

    let waiter = tokio::spawn(async move {
        signal.wait().await;
        signal.is_set()
    });

    let setter = st.clone();
    tokio::task::spawn_blocking(move || {
        setter.lock();
        task.set_status(Status::Done);
        setter.unlock();
    })
    .await
    .unwrap();

    assert!(with_timeout(waiter).await.unwrap());
}

#[tokio::test]
async fn signal_stays_set_and_returns_immediately() {
    let f = fixture();
    f.state.lock();
    let t = f.state.new_task("download", "Download");
    t.set_status(Status::Hold);
    let mut signal = t.ready();
    t.set_status(Status::Do);
    f.state.unlock();

    assert!(signal.is_set());
    with_timeout(signal.wait()).await;
}
