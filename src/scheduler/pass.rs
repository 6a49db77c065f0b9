//! A single evaluation pass
//!
//! lock -> cooldown -> latest reading -> staleness -> evaluate -> notify ->
//! record cooldown. The lock is released on every path once taken.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::alerts::{AlertMessage, ThresholdEvaluator, Violation};
use crate::config::AlerterConfig;
use crate::data::{RowStore, SourceError};
use crate::notify::{DispatchReport, Dispatcher};
use crate::state::{CooldownGate, FileLock, LockError, PassLock, StateError};

/// How a pass ended
#[derive(Debug, Clone, Serialize)]
pub enum PassOutcome {
    /// Another pass holds the lock
    Locked,
    CooldownActive { remaining: Duration },
    /// No usable reading for today
    NoData { reason: String },
    Stale { age: Duration },
    AllClear,
    Alerted {
        violations: Vec<Violation>,
        report: DispatchReport,
    },
}

impl PassOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PassOutcome::Locked => "locked",
            PassOutcome::CooldownActive { .. } => "cooldown",
            PassOutcome::NoData { .. } => "no_data",
            PassOutcome::Stale { .. } => "stale",
            PassOutcome::AllClear => "all_clear",
            PassOutcome::Alerted { .. } => "alerted",
        }
    }
}

/// Runs evaluation passes against the configured stores and channels
pub struct Alerter {
    lock: Arc<dyn PassLock>,
    cooldown: CooldownGate,
    source: RowStore,
    max_data_age: Duration,
    evaluator: ThresholdEvaluator,
    dispatcher: Dispatcher,
}

impl Alerter {
    pub fn new(config: &AlerterConfig, dispatcher: Dispatcher) -> Self {
        let lock = FileLock::new(&config.lock_file).with_stale_after(config.lock_stale_after);

        Self {
            lock: Arc::new(lock),
            cooldown: CooldownGate::new(&config.state_file, config.cooldown),
            source: RowStore::new(&config.data_dir),
            max_data_age: config.max_data_age,
            evaluator: ThresholdEvaluator::new(config.thresholds.clone()),
            dispatcher,
        }
    }

    /// Replace the exclusivity guard
    pub fn with_lock(mut self, lock: Arc<dyn PassLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Run one pass as of `now`
    pub async fn run_pass(&self, now: DateTime<Local>) -> Result<PassOutcome, PassError> {
        let guard = match self.lock.try_acquire() {
            Ok(guard) => guard,
            Err(LockError::AlreadyLocked) => {
                tracing::info!("Another pass is running, skipping");
                return Ok(PassOutcome::Locked);
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = self.run_locked(now).await;

        if let Err(e) = guard.release() {
            tracing::error!(error = %e, "Failed to release pass lock");
        }

        outcome
    }

    async fn run_locked(&self, now: DateTime<Local>) -> Result<PassOutcome, PassError> {
        if let Some(remaining) = self.cooldown.remaining(now)? {
            tracing::debug!(remaining_secs = remaining.as_secs(), "Cooldown active");
            return Ok(PassOutcome::CooldownActive { remaining });
        }

        let reading = match self.source.latest_reading(now.date_naive()) {
            Ok(reading) => reading,
            Err(e) if e.is_unavailable() => {
                tracing::info!(reason = %e, "No usable reading");
                return Ok(PassOutcome::NoData {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if reading.is_stale(now, self.max_data_age) {
            let age = reading.age(now).to_std().unwrap_or_default();
            tracing::info!(age_secs = age.as_secs(), "Latest reading is stale");
            return Ok(PassOutcome::Stale { age });
        }

        let violations = self.evaluator.evaluate(&reading);
        if violations.is_empty() {
            tracing::debug!("All metrics within range");
            return Ok(PassOutcome::AllClear);
        }

        tracing::warn!(violations = violations.len(), "Thresholds violated, sending alert");
        let alert = AlertMessage::compose(&violations, &reading);
        let report = self.dispatcher.dispatch(&alert).await;

        self.cooldown.record_alert(now)?;

        Ok(PassOutcome::Alerted { violations, report })
    }
}

/// Failures that end a pass abnormally
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Cooldown state error: {0}")]
    State(#[from] StateError),

    #[error("Row store error: {0}")]
    Source(#[from] SourceError),
}
