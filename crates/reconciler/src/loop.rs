//! Fixed-interval scheduling of reconciliation passes.
//!
//! The first pass runs one full interval after start. Passes never overlap:
//! the loop awaits each pass before waiting for the next tick, and ticks
//! missed while a pass was running are skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::reconciler::Reconciler;

/// Configuration for the reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Time between passes.
    pub interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl LoopConfig {
    /// Create a loop configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for a zero interval.
    pub fn new(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::invalid_config("Interval must be greater than zero"));
        }
        Ok(Self { interval })
    }
}

/// Counts reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Passes started, whether or not they succeeded.
    pub passes: u64,
    /// Passes that aborted with an error.
    pub failed_passes: u64,
}

/// Handle used to stop a running loop.
#[derive(Debug, Clone)]
pub struct LoopStopper {
    stop_tx: watch::Sender<bool>,
}

impl LoopStopper {
    /// Ask the loop to stop; an in-flight pass finishes first.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Runs one reconciliation pass per tick until stopped.
pub struct ReconciliationLoop {
    reconciler: Arc<Reconciler>,
    config: LoopConfig,
    stop_rx: watch::Receiver<bool>,
}

impl ReconciliationLoop {
    /// Create a loop and the handle that stops it.
    pub fn new(reconciler: Arc<Reconciler>, config: LoopConfig) -> (Self, LoopStopper) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                reconciler,
                config,
                stop_rx,
            },
            LoopStopper { stop_tx },
        )
    }

    /// Run until the stopper fires or is dropped.
    pub async fn run(mut self) -> LoopSummary {
        let period = self.config.interval;
        let now = Instant::now();
        let first_tick = now.checked_add(period).unwrap_or(now);
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut summary = LoopSummary::default();
        info!(interval = ?period, "Reconciliation loop started");

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = self.stop_rx.changed() => {
                    if changed.is_err() || *self.stop_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    summary.passes = summary.passes.saturating_add(1);
                    if let Err(e) = self.reconciler.run_pass().await {
                        summary.failed_passes = summary.failed_passes.saturating_add(1);
                        error!(error = %e, "Reconciliation pass aborted");
                    }
                }
            }
        }

        info!(
            passes = summary.passes,
            failed_passes = summary.failed_passes,
            "Reconciliation loop stopped"
        );
        summary
    }
}
