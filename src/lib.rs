// src/lib.rs

//! Durable change/task state for a package-management daemon.
//!
//! The [`State`] container records every system-altering operation as a
//! [`Change`] made of [`Task`]s linked by wait edges, checkpoints itself
//! through a [`Backend`] whenever the lock is released after a change, and
//! prunes old records. Executing the work is left to the embedding daemon.

pub mod backend;
pub mod cli;
pub mod clock;
pub mod config;
pub mod errors;
pub mod logging;
pub mod state;

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

pub use crate::backend::{Backend, FileBackend, MemoryBackend};
pub use crate::clock::{Clock, MockClock, SystemClock};
pub use crate::errors::StateError;
pub use crate::state::{
    Change, ChangeFilter, ChangeInfo, ReadySignal, RetryPolicy, State, StateOptions, Status, Task,
    TaskInfo, TaskSet,
};

use crate::cli::{CliArgs, Command};
use crate::config::{ConfigFile, PruneConfig, load_or_default};
use crate::state::ProgressInfo;

/// High-level entry point used by `main.rs`.
///
/// State operations block (lock waits, checkpoint retries), so the command
/// runs on the blocking pool.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_or_default(&args.config)
        .with_context(|| format!("loading config {:?}", args.config))?;
    let command = args.command;
    tokio::task::spawn_blocking(move || execute(&cfg, command)).await?
}

fn execute(cfg: &ConfigFile, command: Command) -> Result<()> {
    match command {
        Command::Inspect {
            state,
            select,
            json,
        } => {
            let filter: ChangeFilter = select.parse()?;
            let st = open_state(&state, cfg)?;
            let infos = with_lock(&st, |st| inspect(st, filter))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&infos)?);
            } else {
                print_changes(&infos);
            }
            Ok(())
        }
        Command::Prune { state } => {
            let st = open_state(&state, cfg)?;
            let (before, after) = prune_once(&st, &cfg.prune);
            println!("pruned {} task(s), {after} remaining", before - after);
            Ok(())
        }
        Command::Abort { state, id } => {
            let st = open_state(&state, cfg)?;
            with_lock(&st, |st| {
                let chg = st
                    .change(&id)
                    .ok_or_else(|| StateError::ChangeNotFound(id.clone()))?;
                chg.abort()?;
                Ok(())
            })?;
            println!("change {id} aborted");
            Ok(())
        }
    }
}

/// One prune sweep with the configured windows, then a request for the next
/// checkpoint within `interval` so the following sweep has fresh data.
///
/// Returns the task count before and after the sweep.
pub fn prune_once(st: &State, cfg: &PruneConfig) -> (usize, usize) {
    st.lock();
    let before = st.num_task();
    st.prune(cfg.retention, cfg.abort_age);
    let after = st.num_task();
    st.unlock();
    st.ensure_before(cfg.interval);

    info!(
        tasks_before = before,
        tasks_after = after,
        retention = ?cfg.retention,
        abort_age = ?cfg.abort_age,
        next_within = ?cfg.interval,
        "prune complete"
    );
    (before, after)
}

fn open_state(path: &Path, cfg: &ConfigFile) -> Result<State> {
    let backend = FileBackend::new(path);
    let Some(bytes) = backend.load()? else {
        bail!("no state file at {}", path.display());
    };
    State::read_state_with(backend, cfg.state_options(), bytes.as_slice())
        .with_context(|| format!("reading state file {}", path.display()))
}

/// Run `f` with the state locked, releasing (and checkpointing) afterwards
/// whether or not `f` failed.
fn with_lock<T>(st: &State, f: impl FnOnce(&State) -> Result<T>) -> Result<T> {
    st.lock();
    let out = f(st);
    st.unlock();
    out
}

/// Views of the selected changes, tasks listed in wait order.
fn inspect(st: &State, filter: ChangeFilter) -> Result<Vec<ChangeInfo>> {
    let mut infos = Vec::new();
    for chg in st.changes().iter().filter(|chg| filter.matches(chg)) {
        let mut info = ChangeInfo::from_change(chg);
        info.tasks = Task::in_wait_order(&chg.tasks())?
            .iter()
            .map(TaskInfo::from_task)
            .collect();
        infos.push(info);
    }
    Ok(infos)
}

fn print_changes(infos: &[ChangeInfo]) {
    if infos.is_empty() {
        println!("no matching changes");
        return;
    }

    for chg in infos {
        println!(
            "change {} [{}] {}: {}",
            chg.id, chg.status, chg.kind, chg.summary
        );
        println!("  spawned {}", chg.spawn_time.to_rfc3339());
        if let Some(ready) = chg.ready_time {
            println!("  ready   {}", ready.to_rfc3339());
        }
        for t in &chg.tasks {
            let ProgressInfo { done, total } = t.progress;
            println!(
                "  - task {} [{}] {done}/{total} {}",
                t.id, t.status, t.summary
            );
        }
        if let Some(err) = &chg.err {
            for line in err.lines() {
                println!("  ! {line}");
            }
        }
    }
}
