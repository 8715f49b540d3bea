// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surface: identity the worker registers under, where it
//! persists state, and how verbosely it logs.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lower")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Render/compute farm worker agent.
#[derive(Debug, Parser)]
#[command(name = "oja-agent", version = env!("BUILD_GIT_HASH"))]
pub struct Cli {
    /// Farm this worker registers into.
    #[arg(long, env = "OJA_FARM_ID")]
    pub farm_id: String,

    /// Fleet this worker registers into.
    #[arg(long, env = "OJA_FLEET_ID")]
    pub fleet_id: String,

    /// Directory holding the persisted worker identity and credential files.
    #[arg(long, env = "OJA_STATE_DIR", default_value = "/var/lib/oja-agent")]
    pub state_dir: PathBuf,

    /// Optional TOML config file for the knobs in [`crate::config::Config`].
    #[arg(long, env = "OJA_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
