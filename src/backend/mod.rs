// src/backend/mod.rs

//! Durable-write and wake-up collaborator of [`crate::state::State`].
//!
//! The state hands a complete serialized document to
//! [`Backend::checkpoint`] whenever the lock is released after a change.
//! [`FileBackend`] is the production implementation; [`MemoryBackend`]
//! records checkpoints for tests.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

pub mod mock;

pub use mock::MemoryBackend;

/// Abstract state backend.
pub trait Backend: Send + Sync {
    /// Durably store `data`, replacing any previous checkpoint.
    fn checkpoint(&self, data: &[u8]) -> Result<()>;

    /// Ask the control loop to run again within `d`. Advisory only.
    fn ensure_before(&self, d: Duration);
}

/// Backend that keeps the state document in a single file.
///
/// Each checkpoint is written to a temporary file next to the target,
/// synced, then renamed over it, so readers see either the old or the new
/// document.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    deadline: Mutex<Option<Instant>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            deadline: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last checkpoint, or `None` if nothing was written yet.
    pub fn load(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading state file {:?}", self.path)),
        }
    }

    /// Take the earliest deadline requested through `ensure_before`.
    pub fn take_deadline(&self) -> Option<Instant> {
        self.deadline.lock().take()
    }
}

impl Backend for FileBackend {
    fn checkpoint(&self, data: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("creating dir {:?}", dir))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("creating temp file in {:?}", dir))?;
        tmp.write_all(data)
            .with_context(|| format!("writing temp file for {:?}", self.path))?;
        tmp.as_file()
            .sync_all()
            .with_context(|| format!("syncing temp file for {:?}", self.path))?;
        tmp.persist(&self.path)
            .with_context(|| format!("renaming temp file over {:?}", self.path))?;

        debug!(path = ?self.path, bytes = data.len(), "state file written");
        Ok(())
    }

    fn ensure_before(&self, d: Duration) {
        let when = Instant::now() + d;
        let mut deadline = self.deadline.lock();
        match *deadline {
            Some(existing) if existing <= when => {}
            _ => *deadline = Some(when),
        }
    }
}
