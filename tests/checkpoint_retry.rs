// tests/checkpoint_retry.rs

mod common;
use crate::common::{ChangeBuilder, fixture, init_tracing, panic_message};

use std::time::{Duration, Instant};

use overlord::{MemoryBackend, RetryPolicy, State, StateOptions};
use overlord_test_utils::fake_backend::FlakyBackend;

fn quick_retry(delay_ms: u64, budget_ms: u64) -> StateOptions {
    StateOptions {
        retry: RetryPolicy::new(
            Duration::from_millis(delay_ms),
            Duration::from_millis(budget_ms),
        ),
        ..StateOptions::default()
    }
}

#[test]
fn unlock_of_new_state_writes_initial_checkpoint() {
    let f = fixture();
    assert!(f.state.modified());

    f.state.lock();
    f.state.unlock();

    assert_eq!(f.backend.checkpoints().len(), 1);
    assert!(!f.state.modified());
}

#[test]
fn unmodified_unlock_does_not_checkpoint() {
    let f = fixture();

    f.state.lock();
    f.state.unlock();
    f.state.lock();
    f.state.unlock();

    assert_eq!(f.backend.checkpoints().len(), 1);
}

#[test]
fn reloaded_state_is_not_modified() {
    let f = fixture();
    f.state.lock();
    f.state.set("k", &1);
    f.state.unlock();

    let r = f.reload();
    assert!(!r.state.modified());
    r.state.lock();
    r.state.unlock();
    assert!(r.backend.checkpoints().is_empty());
}

#[test]
fn every_write_marks_modified_and_is_checkpointed() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    st.unlock();

    st.lock();
    let chg = ChangeBuilder::new("install", "Install core")
        .task("download", "Download core")
        .build(st);
    assert!(st.modified());
    st.unlock();
    assert_eq!(f.backend.checkpoints().len(), 2);

    st.lock();
    chg.tasks()[0].set_progress(1, 4);
    st.unlock();
    assert_eq!(f.backend.checkpoints().len(), 3);

    let last = f.backend.last_checkpoint().unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&last).unwrap();
    assert_eq!(doc["tasks"]["2"]["progress"]["done"], 1);
    assert_eq!(doc["tasks"]["2"]["progress"]["total"], 4);
}

#[test]
fn reads_do_not_mark_modified() {
    let f = fixture();
    let st = &f.state;
    st.lock();
    let chg = ChangeBuilder::new("install", "Install core")
        .task("download", "Download core")
        .build(st);
    st.unlock();

    st.lock();
    let _ = st.changes();
    let _ = st.tasks();
    let _ = chg.status();
    let _ = chg.tasks()[0].halt_tasks();
    let _ = st.num_task();
    let _ = st.to_json();
    assert!(!st.modified());
    st.unlock();
}

#[test]
fn retries_until_backend_succeeds() {
    init_tracing();
    let backend = FlakyBackend::failing(2);
    let st = State::with_options(backend.clone(), quick_retry(1, 5_000));

    st.lock();
    st.set("k", &"v");
    st.unlock();

    assert_eq!(backend.attempts(), 3);
    assert!(backend.stored().is_some());
    assert!(!st.modified());
}

#[test]
fn exhausted_budget_is_fatal() {
    init_tracing();
    let backend = FlakyBackend::always_failing();
    let st = State::with_options(backend.clone(), quick_retry(10, 100));

    st.lock();
    st.set("k", &"v");

    let start = Instant::now();
    let msg = panic_message(|| st.unlock()).expect("unlock gives up and panics");
    let elapsed = start.elapsed();

    assert!(
        msg.starts_with("cannot checkpoint even after 100ms of retries every 10ms"),
        "unexpected message: {msg}"
    );
    assert!(msg.contains("disk on fire"));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(backend.attempts() > 2);
    assert!(backend.stored().is_none());
}

#[test]
fn memory_backend_failure_hook() {
    init_tracing();
    let mut remaining = 1;
    let backend = MemoryBackend::new().with_failures(move || {
        if remaining > 0 {
            remaining -= 1;
            anyhow::bail!("transient");
        }
        Ok(())
    });
    let st = State::with_options(backend.clone(), quick_retry(1, 1_000));

    st.lock();
    st.unlock();

    // One failed attempt and one successful one, both recorded.
    assert_eq!(backend.checkpoints().len(), 2);
}

#[test]
fn ensure_before_needs_no_lock() {
    let f = fixture();
    f.state.ensure_before(Duration::from_secs(3));
    assert_eq!(f.backend.ensure_before_hint(), Some(Duration::from_secs(3)));
}
