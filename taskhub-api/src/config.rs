/// Configuration management for the API server
///
/// Configuration is read once from environment variables at start-up. A
/// `.env` file in the working directory is loaded first if present.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8080`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the
///   in-memory store, which is for development only
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `APP_URL`: public base URL used in emails
/// - `APP_DEBUG`: include internal detail in storage error responses
/// - `APP_PRODUCTION`: HSTS and `Secure` cookies
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any
/// - `SESSION_IDLE_TIMEOUT_SECS` / `SESSION_ROTATION_SECS`
/// - `RATE_LIMIT_MAX_REQUESTS` / `RATE_LIMIT_WINDOW_SECS`
/// - `FEED_INTERVAL_SECS`
///
/// Durations are whole seconds between 1 and [`MAX_DURATION_SECS`].
/// - `MAIL_RELAY_URL` / `MAIL_FROM`: unset logs mail instead of sending it
/// - `ADMIN_USERNAME` / `ADMIN_EMAIL` / `ADMIN_PASSWORD`: bootstrap admin
///
/// # Example
///
/// ```no_run
/// use taskhub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use taskhub_shared::auth::session::{SessionConfig, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_ROTATION_SECS};
use taskhub_shared::db::pool::DatabaseConfig;
use taskhub_shared::feed::DEFAULT_INTERVAL;

use crate::middleware::rate_limit::RateLimit;

/// Upper bound for every duration setting (30 days)
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,

    /// `None` selects the in-memory store
    pub database: Option<DatabaseConfig>,

    pub session: SessionConfig,

    pub rate_limit: RateLimit,

    /// Time between change-feed polls
    pub feed_interval: Duration,

    /// `None` logs mail instead of sending it
    pub mail: Option<MailConfig>,

    /// Administrator created at start-up if missing
    pub admin: Option<AdminBootstrap>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Public base URL, used in notification links
    pub app_url: String,

    /// Expose internal error detail to clients
    pub debug: bool,

    /// Enables HSTS and `Secure` cookies
    pub production: bool,

    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_url: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                app_url: "http://localhost:8080".to_string(),
                debug: false,
                production: false,
                cors_origins: vec!["*".to_string()],
            },
            database: None,
            session: SessionConfig::default(),
            rate_limit: RateLimit::default(),
            feed_interval: DEFAULT_INTERVAL,
            mail: None,
            admin: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has a value that does not parse, or if
    /// only part of a group (mail relay, bootstrap admin) is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let defaults = Self::default();

        let database = match vars.get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig::new(
                url,
                vars.parse("DATABASE_MAX_CONNECTIONS", 10u32)?,
            )),
            None => None,
        };

        let cors_origins = match vars.get("CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            None => defaults.api.cors_origins,
        };

        let session = SessionConfig {
            idle_timeout: chrono::Duration::seconds(
                vars.seconds("SESSION_IDLE_TIMEOUT_SECS", DEFAULT_IDLE_TIMEOUT_SECS.unsigned_abs())? as i64,
            ),
            rotation_interval: chrono::Duration::seconds(
                vars.seconds("SESSION_ROTATION_SECS", DEFAULT_ROTATION_SECS.unsigned_abs())? as i64,
            ),
        };

        let max_requests = vars.parse("RATE_LIMIT_MAX_REQUESTS", defaults.rate_limit.max_requests)?;
        if max_requests == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_MAX_REQUESTS",
                value: "0".to_string(),
            });
        }
        let rate_limit = RateLimit {
            max_requests,
            window: Duration::from_secs(vars.seconds("RATE_LIMIT_WINDOW_SECS", defaults.rate_limit.window.as_secs())?),
        };

        let mail = match (vars.get("MAIL_RELAY_URL"), vars.get("MAIL_FROM")) {
            (Some(relay_url), Some(from)) => Some(MailConfig { relay_url, from }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Incomplete("MAIL_RELAY_URL", "MAIL_FROM")),
            (None, Some(_)) => return Err(ConfigError::Incomplete("MAIL_FROM", "MAIL_RELAY_URL")),
        };

        let admin = match (
            vars.get("ADMIN_USERNAME"),
            vars.get("ADMIN_EMAIL"),
            vars.get("ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(AdminBootstrap { username, email, password }),
            (None, None, None) => None,
            _ => return Err(ConfigError::Incomplete("ADMIN_USERNAME", "ADMIN_EMAIL and ADMIN_PASSWORD")),
        };

        Ok(Self {
            api: ApiConfig {
                host: vars.get("API_HOST").unwrap_or(defaults.api.host),
                port: vars.parse("API_PORT", defaults.api.port)?,
                app_url: vars.get("APP_URL").unwrap_or(defaults.api.app_url),
                debug: vars.flag("APP_DEBUG")?,
                production: vars.flag("APP_PRODUCTION")?,
                cors_origins,
            },
            database,
            session,
            rate_limit,
            feed_interval: Duration::from_secs(vars.seconds("FEED_INTERVAL_SECS", DEFAULT_INTERVAL.as_secs())?),
            mail,
            admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Non-blank value, trimmed
    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(name) {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
            None => Ok(default),
        }
    }

    /// Whole seconds in `1..=MAX_DURATION_SECS`
    fn seconds(&self, name: &'static str, default: u64) -> Result<u64, ConfigError> {
        let secs = self.parse(name, default)?;
        if secs == 0 || secs > MAX_DURATION_SECS {
            return Err(ConfigError::Invalid {
                name,
                value: secs.to_string(),
            });
        }
        Ok(secs)
    }

    fn flag(&self, name: &'static str) -> Result<bool, ConfigError> {
        match self.get(name).map(|value| value.to_ascii_lowercase()) {
            None => Ok(false),
            Some(value) => match value.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid { name, value }),
            },
        }
    }
}
