// src/backend/mock.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;

use super::Backend;

type FailHook = Box<dyn FnMut() -> Result<()> + Send>;

/// In-memory backend that records every checkpoint attempt.
///
/// Clones share the recorded data, so a test can keep one handle while the
/// state owns another.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    checkpoints: Vec<Vec<u8>>,
    ensure_before: Option<Duration>,
    fail: Option<FailHook>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a hook consulted on every checkpoint attempt; an `Err` makes
    /// that attempt fail. The payload is recorded either way.
    pub fn with_failures(self, hook: impl FnMut() -> Result<()> + Send + 'static) -> Self {
        self.inner.lock().fail = Some(Box::new(hook));
        self
    }

    /// Every payload passed to `checkpoint`, oldest first.
    pub fn checkpoints(&self) -> Vec<Vec<u8>> {
        self.inner.lock().checkpoints.clone()
    }

    pub fn last_checkpoint(&self) -> Option<Vec<u8>> {
        self.inner.lock().checkpoints.last().cloned()
    }

    pub fn ensure_before_hint(&self) -> Option<Duration> {
        self.inner.lock().ensure_before
    }
}

impl Backend for MemoryBackend {
    fn checkpoint(&self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.checkpoints.push(data.to_vec());
        match inner.fail.as_mut() {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    fn ensure_before(&self, d: Duration) {
        self.inner.lock().ensure_before = Some(d);
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryBackend")
            .field("checkpoints", &inner.checkpoints.len())
            .field("ensure_before", &inner.ensure_before)
            .finish()
    }
}
