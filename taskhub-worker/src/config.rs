/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required) / `DATABASE_MAX_CONNECTIONS`
/// - `REMINDER_WINDOW_HOURS`: how far ahead a deadline counts as close (default 24, at most a year)
/// - `REMINDER_INTERVAL_SECS`: time between sweeps (default 3600)
/// - `APP_URL`: public base URL used in emails
/// - `MAIL_RELAY_URL` / `MAIL_FROM`: unset logs mail instead of sending it

use std::env;
use std::str::FromStr;
use std::time::Duration;

use taskhub_shared::db::pool::DatabaseConfig;

pub const DEFAULT_WINDOW_HOURS: u32 = 24;

pub const MAX_WINDOW_HOURS: u32 = 24 * 366;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database: DatabaseConfig,

    pub window_hours: u32,

    pub interval: Duration,

    pub app_url: String,

    /// `(relay_url, from)`; `None` logs mail instead of sending it
    pub mail: Option<(String, String)>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let database = DatabaseConfig::new(url, parse(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5u32)?);

        let window_hours = parse(get("REMINDER_WINDOW_HOURS"), "REMINDER_WINDOW_HOURS", DEFAULT_WINDOW_HOURS)?;
        if window_hours == 0 || window_hours > MAX_WINDOW_HOURS {
            return Err(ConfigError::Invalid {
                name: "REMINDER_WINDOW_HOURS",
                value: window_hours.to_string(),
            });
        }

        let interval_secs = parse(get("REMINDER_INTERVAL_SECS"), "REMINDER_INTERVAL_SECS", DEFAULT_INTERVAL.as_secs())?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "REMINDER_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let mail = match (get("MAIL_RELAY_URL"), get("MAIL_FROM")) {
            (Some(relay_url), Some(from)) => Some((relay_url, from)),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Incomplete("MAIL_RELAY_URL", "MAIL_FROM")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("MAIL_FROM", "MAIL_RELAY_URL")),
        };

        Ok(Self {
            database,
            window_hours,
            interval: Duration::from_secs(interval_secs),
            app_url: get("APP_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
            mail,
        })
    }
}

fn parse<T: FromStr>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
