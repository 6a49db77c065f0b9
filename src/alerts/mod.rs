//! Threshold alerting for sensor readings
//!
//! Bounds per monitored column, a pure evaluator turning a reading into
//! violations, and the text of the alert sent when any are found.

pub mod checker;
pub mod config;
pub mod message;

pub use checker::ThresholdEvaluator;
pub use config::{MetricBound, Thresholds, Violation};
pub use message::{AlertMessage, ALERT_SUBJECT};
