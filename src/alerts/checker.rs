//! Threshold evaluation of a single reading

use super::config::{Thresholds, Violation};
use crate::data::{FieldValue, Reading};

/// Maps a reading to the violations it contains.
///
/// Every monitored metric is checked independently; a missing or malformed
/// column skips that metric only.
#[derive(Debug, Clone)]
pub struct ThresholdEvaluator {
    thresholds: Thresholds,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// All violations present in `reading`, in threshold order
    pub fn evaluate(&self, reading: &Reading) -> Vec<Violation> {
        self.thresholds
            .iter()
            .filter_map(|bound| match reading.numeric(&bound.column) {
                FieldValue::Number(value) => {
                    tracing::debug!(metric = %bound.column, value, "Checking metric");
                    bound.check(value)
                }
                FieldValue::Missing => {
                    tracing::debug!(metric = %bound.column, "Metric absent, skipping");
                    None
                }
                FieldValue::Invalid(raw) => {
                    tracing::warn!(metric = %bound.column, value = %raw, "Metric is not numeric, skipping");
                    None
                }
            })
            .collect()
    }
}
