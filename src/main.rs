//! # image-janitor
//!
//! ## Startup Sequence
//!
//! 1. **Configuration** - CLI and environment over the optional TOML file
//! 2. **Tracing** - text or JSON subscriber, `RUST_LOG` wins over `--log-level`
//! 3. **Job directory** - must exist and be readable
//! 4. **Docker** - connect and ping
//! 5. **Loop** - first pass after one interval, or a single pass with `--once`
//!
//! Any startup failure exits non-zero. Ctrl+C stops the loop after the
//! current pass.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use image_janitor::startup::{build_notifier, check_job_dir, connect_runtime};
use image_janitor::{Cli, JanitorConfig, LogFormat};
use janitor_reconciler::{LoopConfig, ReconcilerBuilder, ReconciliationLoop};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = JanitorConfig::resolve(&cli).context("Invalid configuration")?;

    init_tracing(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        interval = ?config.interval,
        read_from = %config.read_from.display(),
        docker = %config.docker,
        dry_run = config.dry_run,
        "image-janitor starting"
    );

    check_job_dir(&config.read_from).await?;
    let loop_config = LoopConfig::new(config.interval).context("Invalid interval")?;
    let runtime = connect_runtime(&config.docker).await?;

    let reconciler = Arc::new(
        ReconcilerBuilder::new()
            .with_runtime(Arc::new(runtime))
            .with_notifier(build_notifier(&config))
            .job_dir(config.read_from.clone())
            .dry_run(config.dry_run)
            .build()
            .context("Failed to build reconciler")?,
    );

    if config.once {
        let report = reconciler
            .run_pass()
            .await
            .context("Reconciliation pass failed")?;
        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Single pass finished"
        );
        return Ok(());
    }

    let (reconcile_loop, stopper) = ReconciliationLoop::new(reconciler, loop_config);
    tokio::spawn(async move {
        if wait_for_shutdown().await {
            stopper.stop();
        } else {
            // Dropping the stopper would end the loop.
            std::future::pending::<()>().await;
        }
    });

    let summary = reconcile_loop.run().await;
    info!(
        passes = summary.passes,
        failed_passes = summary.failed_passes,
        "image-janitor stopped"
    );
    Ok(())
}

/// Install the tracing subscriber.
fn init_tracing(config: &JanitorConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)
            .with_context(|| format!("Invalid log level '{}'", config.log_level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}

/// Wait for shutdown signal (Ctrl+C). Returns false if it cannot be
/// observed.
async fn wait_for_shutdown() -> bool {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, stopping after the current pass");
            true
        }
        Err(err) => {
            error!("Failed to listen for shutdown signal: {}", err);
            false
        }
    }
}
