//! Background worker driving evaluation passes on a fixed interval

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use futures::FutureExt;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use super::pass::{Alerter, PassOutcome};

/// Shortest period the loop will tick at
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Running counters for the worker
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassStats {
    pub passes: u64,
    pub alerts_sent: u64,
    pub errors: u64,
    pub last_checked: Option<DateTime<Local>>,
    pub last_alerted: Option<DateTime<Local>>,
    pub last_outcome: Option<&'static str>,
    pub last_error: Option<String>,
}

/// Runs passes forever until stopped; a failing pass never ends the loop
pub struct AlertWorker {
    alerter: Arc<Alerter>,
    interval: Duration,
    stats: Arc<RwLock<PassStats>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl AlertWorker {
    /// Worker ticking every `interval`, raised to at least one millisecond
    pub fn new(alerter: Arc<Alerter>, interval: Duration) -> Self {
        Self {
            alerter,
            interval: interval.max(MIN_INTERVAL),
            stats: Arc::new(RwLock::new(PassStats::default())),
            shutdown_tx: None,
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> PassStats {
        self.stats.read().clone()
    }

    /// Start the background loop
    pub fn start(&mut self) -> tokio::task::JoinHandle<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let alerter = Arc::clone(&self.alerter);
        let stats = Arc::clone(&self.stats);
        let period = self.interval;

        tokio::spawn(async move {
            tracing::info!("Alert worker started with interval {:?}", period);

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_guarded(&alerter, &stats).await;
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            tracing::info!("Alert worker stopped");
        })
    }

    /// Stop the background loop after the current pass
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Run a single pass now, outside the loop
    pub async fn run_once(&self) -> Option<PassOutcome> {
        run_guarded(&self.alerter, &self.stats).await
    }
}

/// Run one pass, absorbing errors and panics into the stats
async fn run_guarded(alerter: &Alerter, stats: &RwLock<PassStats>) -> Option<PassOutcome> {
    let now = Local::now();
    let result = AssertUnwindSafe(alerter.run_pass(now)).catch_unwind().await;

    let mut stats = stats.write();
    stats.passes += 1;
    stats.last_checked = Some(now);

    match result {
        Ok(Ok(outcome)) => {
            if let PassOutcome::Alerted { .. } = outcome {
                stats.alerts_sent += 1;
                stats.last_alerted = Some(now);
            }
            stats.last_outcome = Some(outcome.label());
            Some(outcome)
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Evaluation pass failed");
            stats.errors += 1;
            stats.last_outcome = Some("error");
            stats.last_error = Some(e.to_string());
            None
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(panic = %message, "Evaluation pass panicked");
            stats.errors += 1;
            stats.last_outcome = Some("panic");
            stats.last_error = Some(message);
            None
        }
    }
}
