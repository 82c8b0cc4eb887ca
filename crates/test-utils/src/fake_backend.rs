use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use overlord::Backend;
use parking_lot::Mutex;

/// A backend that:
/// - counts every checkpoint attempt
/// - fails the first `failures` attempts (all of them for `always_failing`)
/// - keeps the payload of the last successful attempt.
///
/// Clones share the counters.
#[derive(Clone, Default)]
pub struct FlakyBackend {
    attempts: Arc<AtomicUsize>,
    failures: Option<usize>,
    stored: Arc<Mutex<Option<Vec<u8>>>>,
}

impl FlakyBackend {
    /// Fail the first `failures` attempts, then succeed.
    pub fn failing(failures: usize) -> Self {
        Self {
            failures: Some(failures),
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<Vec<u8>> {
        self.stored.lock().clone()
    }
}

impl Backend for FlakyBackend {
    fn checkpoint(&self, data: &[u8]) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.failures {
            Some(n) if attempt > n => {
                *self.stored.lock() = Some(data.to_vec());
                Ok(())
            }
            _ => bail!("disk on fire (attempt {attempt})"),
        }
    }

    fn ensure_before(&self, _d: Duration) {}
}
