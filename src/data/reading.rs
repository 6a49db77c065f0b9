//! Sensor reading as stored in the daily row store

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Serialize;

use super::source::SourceError;

/// Column holding the ingestion timestamp
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// One row of the row store: its timestamp plus every column as raw text
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Local>,
    columns: Vec<(String, String)>,
}

/// Result of looking up a numeric column
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Column absent or blank
    Missing,
    /// Column present but not a finite number
    Invalid(String),
    Number(f64),
}

impl Reading {
    /// Build a reading from `(column, value)` pairs.
    ///
    /// The timestamp column is parsed; column order is kept for display.
    pub fn from_columns(columns: Vec<(String, String)>) -> Result<Self, SourceError> {
        let raw = columns
            .iter()
            .find(|(name, _)| name == TIMESTAMP_COLUMN)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
            .ok_or(SourceError::MissingTimestamp)?;
        let timestamp = parse_timestamp(raw)?;

        Ok(Self { timestamp, columns })
    }

    /// Raw value of a column, `None` when absent or blank
    pub fn field(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Numeric value of a column
    pub fn numeric(&self, name: &str) -> FieldValue {
        match self.field(name) {
            None => FieldValue::Missing,
            Some(raw) => match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => FieldValue::Number(value),
                _ => FieldValue::Invalid(raw.to_string()),
            },
        }
    }

    /// All columns in row-store order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Time elapsed between the reading and `now`; negative for future timestamps
    pub fn age(&self, now: DateTime<Local>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// Whether the reading is older than `max_age` at `now`
    pub fn is_stale(&self, now: DateTime<Local>, max_age: Duration) -> bool {
        chrono::Duration::from_std(max_age)
            .map(|max| self.age(now) > max)
            .unwrap_or(false)
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Offset-bearing timestamps are converted to local time; naive ones are
/// taken as local time, which is what the ingestion side writes.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Local>, SourceError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Local));
    }

    let naive = raw
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|_| SourceError::InvalidTimestamp(raw.to_string()))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| SourceError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn local(h: u32, m: u32) -> DateTime<Local> {
        let naive = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap();
        Local.from_local_datetime(&naive).earliest().unwrap()
    }

    fn reading(pairs: &[(&str, &str)]) -> Reading {
        Reading::from_columns(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_naive_timestamp() {
        let ts = parse_timestamp("2025-06-01T12:30:00.123456").unwrap();
        assert_eq!((ts.hour(), ts.minute()), (12, 30));

        let ts = parse_timestamp("2025-06-01 12:30:00").unwrap();
        assert_eq!(ts, local(12, 30));
    }

    #[test]
    fn test_parse_offset_timestamp() {
        let ts = parse_timestamp("2025-06-01T12:30:00+00:00").unwrap();
        assert_eq!(ts.timestamp(), 1748781000);
    }

    #[test]
    fn test_parse_bad_timestamp() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(SourceError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_missing_timestamp() {
        let result = Reading::from_columns(vec![("air_temperature".into(), "25".into())]);
        assert!(matches!(result, Err(SourceError::MissingTimestamp)));

        let result = Reading::from_columns(vec![("timestamp".into(), "  ".into())]);
        assert!(matches!(result, Err(SourceError::MissingTimestamp)));
    }

    #[test]
    fn test_numeric_fields() {
        let r = reading(&[
            ("timestamp", "2025-06-01T12:00:00"),
            ("air_temperature", " 24.5 "),
            ("air_humidity", "n/a"),
            ("co2", ""),
            ("ph_level", "NaN"),
        ]);
        assert_eq!(r.numeric("air_temperature"), FieldValue::Number(24.5));
        assert_eq!(r.numeric("air_humidity"), FieldValue::Invalid("n/a".into()));
        assert_eq!(r.numeric("co2"), FieldValue::Missing);
        assert_eq!(r.numeric("soil1"), FieldValue::Missing);
        assert!(matches!(r.numeric("ph_level"), FieldValue::Invalid(_)));
    }

    #[test]
    fn test_staleness() {
        let r = reading(&[("timestamp", "2025-06-01T12:00:00")]);
        let max_age = Duration::from_secs(15 * 60);

        assert!(!r.is_stale(local(12, 10), max_age));
        assert!(!r.is_stale(local(12, 15), max_age));
        assert!(r.is_stale(local(12, 20), max_age));
        // Future readings count as fresh
        assert!(!r.is_stale(local(11, 0), max_age));
        assert_eq!(r.age(local(12, 20)), chrono::Duration::minutes(20));
    }
}
