// src/clock/mod.rs

//! Time source for spawn/ready timestamps, log lines and pruning.

use std::fmt::Debug;

use chrono::{DateTime, Utc};

pub mod mock;

pub use mock::MockClock;

/// Abstract wall clock.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Implementation that uses the system clock.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
