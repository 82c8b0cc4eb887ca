// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `overlord-state`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "overlord-state",
    version,
    about = "Inspect and maintain a persisted change/task state file.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `overlord.toml` in the current working directory. Built-in
    /// defaults are used when it does not exist.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `OVERLORD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print changes with their tasks in wait order.
    Inspect {
        /// State file written by a `FileBackend`.
        #[arg(long, value_name = "PATH")]
        state: PathBuf,

        /// Which changes to show: all, in-progress or ready.
        #[arg(long, value_name = "SELECT", default_value = "in-progress")]
        select: String,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Run one prune sweep with the configured windows.
    Prune {
        #[arg(long, value_name = "PATH")]
        state: PathBuf,
    },

    /// Abort a change that is still in progress.
    Abort {
        #[arg(long, value_name = "PATH")]
        state: PathBuf,

        /// ID of the change.
        id: String,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
