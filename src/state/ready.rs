// src/state/ready.rs

//! Set-once readiness signal for changes and tasks.

use tokio::sync::watch;

/// Owner side, stored with the entity.
#[derive(Debug)]
pub(crate) struct ReadyFlag {
    tx: watch::Sender<bool>,
}

impl ReadyFlag {
    pub fn new(ready: bool) -> Self {
        let (tx, _rx) = watch::channel(ready);
        Self { tx }
    }

    /// Set the flag. Returns `true` if this call set it.
    pub fn set(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ReadySignal {
        ReadySignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observer side of a readiness signal.
///
/// Obtained under the state lock; waiting on it does not need the lock.
/// Once set the signal stays set, and it is restored from the stored status
/// when state is reloaded.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<bool>,
}

impl ReadySignal {
    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is set.
    ///
    /// Returns immediately if it already is. If the entity is dropped from
    /// the state (pruned) before becoming ready this returns as well.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|ready| *ready).await;
    }
}
