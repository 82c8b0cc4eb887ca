// src/state/mod.rs

//! Changes, tasks and the state that holds them.
//!
//! - [`state`] is the container with its lock, factories and accessors.
//! - [`change`] and [`task`] provide handles onto records in the container.
//! - [`taskset`] groups tasks built together.
//! - [`status`] defines statuses and how a change aggregates them.
//! - [`checkpoint`] writes the state through the backend with bounded retry.
//! - [`persist`] owns the on-disk document layout.
//! - [`prune`] removes old records and holds stuck changes.
//! - [`report`] builds serializable views for display.
//!
//! Misuse that breaks the memory/disk contract panics with a message
//! starting with `internal error:`; ordinary conditions are
//! [`StateError`](crate::errors::StateError)s.

mod cache;
pub mod change;
pub mod checkpoint;
mod data;
mod graph;
mod persist;
pub mod prune;
mod ready;
pub mod report;
#[allow(clippy::module_inception)]
pub mod state;
pub mod status;
pub mod task;
pub mod taskset;

pub use change::Change;
pub use checkpoint::RetryPolicy;
pub use ready::ReadySignal;
pub use report::{API_DATA_KEY, ChangeFilter, ChangeInfo, ProgressInfo, TaskInfo};
pub use state::{State, StateOptions};
pub use status::Status;
pub use task::Task;
pub use taskset::TaskSet;
