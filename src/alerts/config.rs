//! Threshold configuration and violation types

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Acceptable closed range for one monitored column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricBound {
    /// Row store column name
    pub column: String,
    /// Human-readable name used in alert text
    pub label: String,
    /// Unit suffix appended to values in alert text
    pub unit: String,
    pub min: f64,
    pub max: f64,
}

impl MetricBound {
    pub fn new(
        column: impl Into<String>,
        label: impl Into<String>,
        unit: impl Into<String>,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            column: column.into(),
            label: label.into(),
            unit: unit.into(),
            min,
            max,
        }
    }

    /// Air temperature, 23-30 °C
    pub fn temperature() -> Self {
        Self::new("air_temperature", "Temperature", "°C", 23.0, 30.0)
    }

    /// Air humidity, 40-60 %
    pub fn humidity() -> Self {
        Self::new("air_humidity", "Humidity", "%", 40.0, 60.0)
    }

    /// Whether `value` lies within `[min, max]`; both ends are allowed
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Violation for `value`, or `None` when it is in range
    pub fn check(&self, value: f64) -> Option<Violation> {
        if self.contains(value) {
            return None;
        }

        Some(Violation {
            metric: self.column.clone(),
            value,
            min: self.min,
            max: self.max,
            message: format!(
                "❗️ {label}: {value}{unit} (allowed: {min}-{max}{unit})",
                label = self.label,
                unit = self.unit,
                min = self.min,
                max = self.max,
            ),
        })
    }
}

/// Ordered set of monitored metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds(Vec<MetricBound>);

impl Thresholds {
    pub fn new(bounds: Vec<MetricBound>) -> Self {
        Self(bounds)
    }

    /// Bound for a column
    pub fn get(&self, column: &str) -> Option<&MetricBound> {
        self.0.iter().find(|b| b.column == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricBound> {
        self.0.iter()
    }

    /// Reject bounds that are not finite or whose range is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for bound in &self.0 {
            if !bound.min.is_finite() || !bound.max.is_finite() {
                return Err(ConfigError::NonFiniteBounds {
                    metric: bound.column.clone(),
                    min: bound.min,
                    max: bound.max,
                });
            }
            if bound.min > bound.max {
                return Err(ConfigError::InvalidBounds {
                    metric: bound.column.clone(),
                    min: bound.min,
                    max: bound.max,
                });
            }
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self(vec![MetricBound::temperature(), MetricBound::humidity()])
    }
}

/// A metric found outside its range during one pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Column that was out of range
    pub metric: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub message: String,
}
