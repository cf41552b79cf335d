// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pvd`: runs the preview session engine until interrupted

use clap::Parser;
use pv_daemon::{env, lifecycle, logging, DaemonConfig, LifecycleError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "pvd", version, about = "Preview environment daemon")]
struct Args {
    /// Configuration file
    #[arg(short, long, env = env::CONFIG_VAR)]
    config: Option<PathBuf>,

    /// Override the storage folder from the configuration file
    #[arg(long)]
    storage_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pvd: {e}");
            tracing::error!(error = %e, "daemon exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), LifecycleError> {
    let path = args.config.unwrap_or_else(env::default_config_path);
    let mut config = DaemonConfig::load(&path)?;
    if let Some(dir) = args.storage_dir {
        config.storage_folder = dir;
    }
    let _log_guard = logging::init(&config.log)?;
    tracing::info!(config = %path.display(), "starting pvd");

    let daemon = lifecycle::startup(config).await?;
    lifecycle::wait_for_signal().await?;
    daemon.shutdown(env::drain_timeout()).await
}
