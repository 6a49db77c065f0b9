//! Service configuration loaded from the environment
//!
//! Everything is read once at startup and handed to components as an
//! immutable value. Nothing below `main` looks at the environment again.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::alerts::{MetricBound, Thresholds};

/// Top-level alerter configuration
#[derive(Debug, Clone, Serialize)]
pub struct AlerterConfig {
    /// Directory holding one `<YYYY-MM-DD>.csv` row store per day
    pub data_dir: PathBuf,
    /// SQLite subscriber directory
    pub db_path: PathBuf,
    /// File holding the last alert instant
    pub state_file: PathBuf,
    /// Exclusivity token path
    pub lock_file: PathBuf,
    /// Age after which an existing lock is considered abandoned
    pub lock_stale_after: Option<Duration>,
    pub check_interval: Duration,
    pub cooldown: Duration,
    pub max_data_age: Duration,
    /// Per-call timeout for every outbound notification request
    pub send_timeout: Duration,
    pub thresholds: Thresholds,
    pub email: Option<EmailConfig>,
    pub chat: Option<ChatConfig>,
}

/// SMTP submission settings; present only when credentials are configured
#[derive(Clone, Serialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender: String,
    #[serde(skip)]
    pub password: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("sender", &self.sender)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Chat bot settings; present only when a bot token is configured
#[derive(Clone, Serialize)]
pub struct ChatConfig {
    pub api_url: String,
    #[serde(skip)]
    pub bot_token: String,
}

impl std::fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_url", &self.api_url)
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

impl Default for AlerterConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("box_data"),
            db_path: PathBuf::from("telegram_users.db"),
            state_file: PathBuf::from("last_alert_time.txt"),
            lock_file: PathBuf::from("alert_check.lock"),
            lock_stale_after: Some(Duration::from_secs(600)),
            check_interval: Duration::from_secs(10),
            cooldown: Duration::from_secs(2 * 60 * 60),
            max_data_age: Duration::from_secs(15 * 60),
            send_timeout: Duration::from_secs(5),
            thresholds: Thresholds::default(),
            email: None,
            chat: None,
        }
    }
}

impl AlerterConfig {
    /// Build the configuration from environment variables.
    ///
    /// Missing variables take their defaults. Unparsable values and zero
    /// durations are logged and also fall back to the default; only invalid
    /// threshold bounds are fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Env { lookup: &lookup };

        let path = |key: &str, default: PathBuf| env.get(key).map(PathBuf::from).unwrap_or(default);
        let secs = |key: &str, default: Duration| match env.parse::<u64>(key) {
            Some(0) => {
                tracing::warn!(key, "Ignoring zero duration, using default");
                default
            }
            Some(secs) => Duration::from_secs(secs),
            None => default,
        };

        let lock_stale_after = match env.parse::<u64>("ALERTER_LOCK_STALE_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.lock_stale_after,
        };

        let temperature = MetricBound::temperature();
        let humidity = MetricBound::humidity();
        let thresholds = Thresholds::new(vec![
            MetricBound {
                min: env.parse("TEMP_MIN").unwrap_or(temperature.min),
                max: env.parse("TEMP_MAX").unwrap_or(temperature.max),
                ..temperature
            },
            MetricBound {
                min: env.parse("HUMIDITY_MIN").unwrap_or(humidity.min),
                max: env.parse("HUMIDITY_MAX").unwrap_or(humidity.max),
                ..humidity
            },
        ]);
        thresholds.validate()?;

        let email = match (env.get("ALERTER_EMAIL"), env.get("ALERTER_PASSWORD")) {
            (Some(sender), Some(password)) => Some(EmailConfig {
                smtp_host: env
                    .get("ALERTER_SMTP_HOST")
                    .unwrap_or_else(|| "smtp.mail.ru".to_string()),
                smtp_port: env.parse("ALERTER_SMTP_PORT").unwrap_or(465),
                sender,
                password,
            }),
            _ => None,
        };

        let chat = env.get("BOT_TOKEN").map(|bot_token| ChatConfig {
            api_url: env
                .get("ALERTER_CHAT_API_URL")
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            bot_token,
        });

        Ok(Self {
            data_dir: path("ALERTER_DATA_DIR", defaults.data_dir),
            db_path: path("ALERTER_DB_PATH", defaults.db_path),
            state_file: path("ALERTER_STATE_FILE", defaults.state_file),
            lock_file: path("ALERTER_LOCK_FILE", defaults.lock_file),
            lock_stale_after,
            check_interval: secs("ALERTER_CHECK_INTERVAL_SECS", defaults.check_interval),
            cooldown: secs("ALERTER_COOLDOWN_SECS", defaults.cooldown),
            max_data_age: secs("ALERTER_MAX_DATA_AGE_SECS", defaults.max_data_age),
            send_timeout: secs("ALERTER_SEND_TIMEOUT_SECS", defaults.send_timeout),
            thresholds,
            email,
            chat,
        })
    }
}

struct Env<'a, F> {
    lookup: &'a F,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty, trimmed value of `key`
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparsable setting, using default");
                None
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bounds for {metric}: min {min} is greater than max {max}")]
    InvalidBounds { metric: String, min: f64, max: f64 },

    #[error("Invalid bounds for {metric}: min {min} and max {max} must be finite")]
    NonFiniteBounds { metric: String, min: f64, max: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AlerterConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AlerterConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.check_interval, Duration::from_secs(10));
        assert_eq!(config.cooldown, Duration::from_secs(7200));
        assert_eq!(config.max_data_age, Duration::from_secs(900));
        assert_eq!(config.data_dir, PathBuf::from("box_data"));
        assert!(config.email.is_none());
        assert!(config.chat.is_none());

        let temp = config.thresholds.get("air_temperature").unwrap();
        assert_eq!((temp.min, temp.max), (23.0, 30.0));
        let humidity = config.thresholds.get("air_humidity").unwrap();
        assert_eq!((humidity.min, humidity.max), (40.0, 60.0));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ALERTER_COOLDOWN_SECS", "60"),
            ("TEMP_MAX", "28.5"),
            ("ALERTER_LOCK_STALE_SECS", "0"),
            ("BOT_TOKEN", "123:abc"),
        ])
        .unwrap();
        assert_eq!(config.cooldown, Duration::from_secs(60));
        assert_eq!(config.thresholds.get("air_temperature").unwrap().max, 28.5);
        assert!(config.lock_stale_after.is_none());
        assert_eq!(config.chat.unwrap().api_url, "https://api.telegram.org");
    }

    #[test]
    fn test_unparsable_value_falls_back() {
        let config = load(&[("ALERTER_CHECK_INTERVAL_SECS", "soon")]).unwrap();
        assert_eq!(config.check_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_durations_fall_back() {
        let config = load(&[
            ("ALERTER_CHECK_INTERVAL_SECS", "0"),
            ("ALERTER_COOLDOWN_SECS", "0"),
            ("ALERTER_MAX_DATA_AGE_SECS", "0"),
            ("ALERTER_SEND_TIMEOUT_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(config.check_interval, Duration::from_secs(10));
        assert_eq!(config.cooldown, Duration::from_secs(7200));
        assert_eq!(config.max_data_age, Duration::from_secs(900));
        assert_eq!(config.send_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_email_needs_both_credentials() {
        let config = load(&[("ALERTER_EMAIL", "bot@example.com")]).unwrap();
        assert!(config.email.is_none());

        let config = load(&[
            ("ALERTER_EMAIL", "bot@example.com"),
            ("ALERTER_PASSWORD", "secret"),
        ])
        .unwrap();
        let email = config.email.unwrap();
        assert_eq!(email.smtp_host, "smtp.mail.ru");
        assert_eq!(email.smtp_port, 465);
        assert!(!format!("{:?}", email).contains("secret"));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err = load(&[("HUMIDITY_MIN", "70"), ("HUMIDITY_MAX", "50")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { .. }));
    }

    #[test]
    fn test_non_finite_bounds_rejected() {
        let err = load(&[("TEMP_MIN", "NaN")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NonFiniteBounds { ref metric, .. } if metric == "air_temperature"
        ));

        let err = load(&[("HUMIDITY_MAX", "inf")]).unwrap_err();
        assert!(matches!(err, ConfigError::NonFiniteBounds { .. }));
    }
}
