//! Growbox Alerter: threshold alerting for grow-box sensor readings
//!
//! Periodically inspects the newest reading in the daily row store and, when
//! a monitored metric is out of range, fans an alert out to email and chat
//! subscribers.
//!
//! # Features
//!
//! - **Tail-only reads**: only the last row of today's CSV store is parsed
//! - **Staleness check**: old readings never trigger or suppress an alert
//! - **Persistent cooldown**: at most one alert per cooldown window, across restarts
//! - **Exclusive passes**: an atomic lock file keeps concurrent instances apart
//! - **Best-effort fan-out**: per-channel and per-recipient failures are isolated
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use growbox_alerter::config::AlerterConfig;
//! use growbox_alerter::directory::SqliteDirectory;
//! use growbox_alerter::notify::Dispatcher;
//! use growbox_alerter::scheduler::Alerter;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AlerterConfig::from_env()?;
//! let directory = SqliteDirectory::open(&config.db_path, config.send_timeout);
//! let alerter = Alerter::new(&config, Dispatcher::new(Arc::new(directory)));
//!
//! let outcome = alerter.run_pass(chrono::Local::now()).await?;
//! println!("Pass ended: {}", outcome.label());
//! # Ok(())
//! # }
//! ```

pub mod alerts;
pub mod config;
pub mod data;
pub mod directory;
pub mod notify;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use alerts::{AlertMessage, MetricBound, ThresholdEvaluator, Thresholds, Violation};
pub use config::{AlerterConfig, ConfigError};
pub use data::{Reading, RowStore};
pub use scheduler::{AlertWorker, Alerter, PassOutcome};
