//! Persisted cooldown between alert dispatches
//!
//! The last alert instant is stored as Unix seconds in a small text file
//! so that the cooldown survives restarts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

/// Reads and updates the last-alert instant
#[derive(Debug, Clone)]
pub struct CooldownGate {
    path: PathBuf,
    duration: Duration,
}

impl CooldownGate {
    pub fn new<P: AsRef<Path>>(path: P, duration: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            duration,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Last recorded alert instant.
    ///
    /// Returns `None` when nothing was recorded yet or the stored value
    /// cannot be parsed; the latter is logged so it does not silently
    /// suppress alerts.
    pub fn last_alert(&self) -> Result<Option<DateTime<Utc>>, StateError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parsed = contents
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|secs| secs.is_finite())
            .and_then(from_unix_secs);

        if parsed.is_none() {
            tracing::warn!(
                path = %self.path.display(),
                contents = %contents.trim(),
                "Unreadable cooldown state, treating cooldown as inactive"
            );
        }

        Ok(parsed)
    }

    /// Time left before another alert may be sent, `None` when inactive
    pub fn remaining(&self, now: DateTime<Local>) -> Result<Option<Duration>, StateError> {
        let Some(last) = self.last_alert()? else {
            return Ok(None);
        };

        let elapsed = now.with_timezone(&Utc).signed_duration_since(last);
        let Ok(window) = chrono::Duration::from_std(self.duration) else {
            return Ok(Some(self.duration));
        };
        if elapsed >= window {
            return Ok(None);
        }

        Ok(Some((window - elapsed).to_std().unwrap_or(self.duration)))
    }

    /// Whether an alert was sent less than the cooldown duration before `now`
    pub fn is_cooldown_active(&self, now: DateTime<Local>) -> Result<bool, StateError> {
        Ok(self.remaining(now)?.is_some())
    }

    /// Record `at` as the last alert instant, replacing the file atomically
    pub fn record_alert(&self, at: DateTime<Local>) -> Result<(), StateError> {
        let secs = at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1e6;
        let tmp = self.path.with_extension("tmp");

        fs::write(&tmp, format!("{:.6}", secs))?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), at = %at, "Recorded alert instant");
        Ok(())
    }
}

fn from_unix_secs(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
