//! Evaluation passes and the loop that drives them

pub mod pass;
pub mod worker;

pub use pass::{Alerter, PassError, PassOutcome};
pub use worker::{AlertWorker, PassStats};
