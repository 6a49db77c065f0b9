//! Alert text composition

use serde::Serialize;

use super::config::Violation;
use crate::data::Reading;

/// Subject line used for every alert
pub const ALERT_SUBJECT: &str = "🚨 Urgent notice from the grow-box monitoring system";

/// A composed alert ready for dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

impl AlertMessage {
    /// Compose one alert covering every violation plus the full reading
    pub fn compose(violations: &[Violation], reading: &Reading) -> Self {
        let mut body = String::from("The following critical deviations were detected:\n\n");
        for violation in violations {
            body.push_str(&violation.message);
            body.push('\n');
        }

        body.push('\n');
        body.push_str(&"=".repeat(40));
        body.push_str("\n\nFULL READING:\n");
        for (column, value) in reading.columns() {
            body.push_str(&format!("- {}: {}\n", display_name(column), value));
        }

        Self {
            subject: ALERT_SUBJECT.to_string(),
            body,
        }
    }
}

/// `air_temperature` -> `Air temperature`
fn display_name(column: &str) -> String {
    let spaced = column.replace('_', " ").to_lowercase();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::MetricBound;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("air_temperature"), "Air temperature");
        assert_eq!(display_name("CO2"), "Co2");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn test_compose() {
        let reading = Reading::from_columns(vec![
            ("timestamp".into(), "2025-06-01T12:00:00".into()),
            ("air_temperature".into(), "35.0".into()),
            ("air_humidity".into(), "20".into()),
        ])
        .unwrap();
        let violations = vec![
            MetricBound::temperature().check(35.0).unwrap(),
            MetricBound::humidity().check(20.0).unwrap(),
        ];

        let alert = AlertMessage::compose(&violations, &reading);
        assert_eq!(alert.subject, ALERT_SUBJECT);

        let lines: Vec<&str> = alert.body.lines().collect();
        assert!(lines[2].contains("Temperature: 35°C"));
        assert!(lines[3].contains("Humidity: 20%"));
        assert!(alert.body.contains(&"=".repeat(40)));
        assert!(alert.body.contains("- Timestamp: 2025-06-01T12:00:00\n"));
        assert!(alert.body.ends_with("- Air humidity: 20\n"));
    }
}
