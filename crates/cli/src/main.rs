// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `oja-agent`: the worker agent binary. Thin entrypoint — parses flags,
//! loads config, wires up the concrete `(ActionRunner, ServiceClient,
//! Clock)` triple, and hands off to [`agent::run`].

mod agent;
mod cli;
mod config;
mod service_client;

use clap::Parser;
use cli::Cli;
use config::Config;
use oja_adapters::ProcessActionRunner;
use oja_core::SystemClock;
use oja_daemon::lifecycle::FarmFleet;
use oja_storage::WorkerIdentity;
use service_client::UnwiredServiceClient;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Generic agent orchestration failures map to this; the "process exits"
/// rows of spec §7 (abort bootstrap, worker not found under exit policy)
/// get their own codes so an operator can tell them apart in a supervisor.
const EXIT_OK: i32 = 0;
const EXIT_BOOTSTRAP_ABORTED: i32 = 1;
const EXIT_WORKER_NOT_FOUND: i32 = 2;
const EXIT_CONFIG_ERROR: i32 = 3;
const EXIT_INTERNAL: i32 = 70;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load config");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    };

    if let Err(err) = std::fs::create_dir_all(&cli.state_dir) {
        tracing::error!(error = %err, path = %cli.state_dir.display(), "failed to create state dir");
        std::process::exit(EXIT_INTERNAL);
    }

    let farm_fleet = FarmFleet { farm_id: cli.farm_id.clone(), fleet_id: cli.fleet_id.clone() };
    let identity = WorkerIdentity::new(cli.state_dir.join("identity.json"));
    let client = Arc::new(UnwiredServiceClient);
    let runner = Arc::new(ProcessActionRunner::with_default_resolver());

    let result = agent::run(
        client,
        SystemClock,
        runner,
        farm_fleet,
        &identity,
        cli.state_dir.join("agent_credentials.json"),
        cli.state_dir.join("queues"),
        &config,
    )
    .await;

    match result {
        Ok(()) => std::process::exit(EXIT_OK),
        Err(err @ agent::AgentError::Lifecycle(oja_daemon::lifecycle::LifecycleError::Aborted(_))) => {
            tracing::error!(error = %err, "bootstrap aborted");
            std::process::exit(EXIT_BOOTSTRAP_ABORTED);
        }
        Err(err @ agent::AgentError::WorkerNotFoundExit(_)) => {
            tracing::error!(error = %err, "exiting per worker_not_found_policy");
            std::process::exit(EXIT_WORKER_NOT_FOUND);
        }
        Err(err) => {
            tracing::error!(error = %err, "agent exited with an error");
            std::process::exit(EXIT_INTERNAL);
        }
    }
}

fn init_tracing(log_level: cli::LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_tracing_level().to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
