// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! qjd: the queue-job runner daemon.

use qj_core::SystemClock;
use qj_runner::runner::RunnerConfig;
use qj_runner::{HttpExecutor, PgConnector, Runner, Settings};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "invalid settings");
            return ExitCode::FAILURE;
        }
    };
    if settings.disabled() {
        info!("QJ_CHANNELS is not set, job runner disabled");
        return ExitCode::SUCCESS;
    }

    let executor = match HttpExecutor::new(settings.port) {
        Ok(executor) => executor,
        Err(err) => {
            error!(error = %err, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let connector = PgConnector::new(settings.database_url.clone());
    let config = RunnerConfig::new(settings.channels.clone(), settings.db_names.clone());
    let cancel = CancellationToken::new();

    let mut runner =
        match Runner::new(config, connector, executor, SystemClock, cancel.clone()) {
            Ok(runner) => runner,
            Err(err) => {
                error!(error = %err, "invalid channel configuration");
                return ExitCode::FAILURE;
            }
        };

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("graceful stop requested");
            cancel.cancel();
        }
    });

    runner.run().await;
    ExitCode::SUCCESS
}
