// tests/common/mod.rs

#![allow(dead_code)]

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use overlord::{MemoryBackend, MockClock, RetryPolicy, State, StateOptions};

pub use overlord_test_utils::builders::{ChangeBuilder, epoch};
pub use overlord_test_utils::init_tracing;

/// A state on a recording backend with a frozen clock at [`epoch`].
pub struct Fixture {
    pub state: State,
    pub backend: MemoryBackend,
    pub clock: MockClock,
}

pub fn options(clock: &MockClock) -> StateOptions {
    StateOptions {
        retry: RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(200)),
        clock: Arc::new(clock.clone()),
    }
}

pub fn fixture() -> Fixture {
    init_tracing();
    let backend = MemoryBackend::new();
    let clock = MockClock::new(epoch());
    let state = State::with_options(backend.clone(), options(&clock));
    Fixture {
        state,
        backend,
        clock,
    }
}

impl Fixture {
    /// Rehydrate the last checkpoint into a fresh state sharing the clock.
    pub fn reload(&self) -> Fixture {
        let bytes = self
            .backend
            .last_checkpoint()
            .expect("at least one checkpoint");
        let backend = MemoryBackend::new();
        let state = State::read_state_with(backend.clone(), options(&self.clock), bytes.as_slice())
            .expect("reload state");
        Fixture {
            state,
            backend,
            clock: self.clock.clone(),
        }
    }
}

/// Run `f` and return its panic message, or `None` if it did not panic.
pub fn panic_message<F: FnOnce()>(f: F) -> Option<String> {
    catch_unwind(AssertUnwindSafe(f))
        .err()
        .map(|payload| payload_text(payload.as_ref()))
}

fn payload_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "<non-string panic>".to_string()
    }
}
