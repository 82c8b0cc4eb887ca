// src/state/checkpoint.rs

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::backend::Backend;

/// How long and how often a failing checkpoint is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Total elapsed time after which a failing checkpoint is fatal.
    pub budget: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(50);
    pub const DEFAULT_BUDGET: Duration = Duration::from_secs(5);

    pub fn new(delay: Duration, budget: Duration) -> Self {
        Self { delay, budget }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY, Self::DEFAULT_BUDGET)
    }
}

/// Hand `data` to the backend, retrying every `policy.delay` until it
/// succeeds.
///
/// Panics once `policy.budget` has elapsed without a successful attempt:
/// the caller must not carry on with state that may not be on disk.
pub(crate) fn checkpoint_with_retry(backend: &dyn Backend, policy: &RetryPolicy, data: &[u8]) {
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let err = match backend.checkpoint(data) {
            Ok(()) => {
                debug!(attempts, bytes = data.len(), "state checkpointed");
                return;
            }
            Err(err) => err,
        };

        if start.elapsed() >= policy.budget {
            error!(attempts, error = %err, "giving up on state checkpoint");
            panic!(
                "cannot checkpoint even after {:?} of retries every {:?}: {}",
                policy.budget, policy.delay, err
            );
        }

        warn!(attempts, error = %err, "state checkpoint failed; retrying");
        thread::sleep(policy.delay);
    }
}
