//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono_tz::Tz;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    /// When unset, subscribers and the notification ledger live in JSON files under `data_dir`.
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub mini_app_url: Option<String>,
    pub api_token: Option<String>,
    pub cors_origin: String,
    pub notifier_interval: Duration,
    pub followup_delay: Duration,
    pub external_call_timeout: Duration,
    /// Zone whose local midnight clears the notification ledger.
    pub ledger_reset_timezone: Tz,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage ---
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        // --- Telegram ---
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| ConfigError::MissingVar("TELEGRAM_BOT_TOKEN".to_string()))?;
        let telegram_api_url = lookup("TELEGRAM_API_URL")
            .unwrap_or_else(|| "https://api.telegram.org".to_string())
            .trim_end_matches('/')
            .to_string();
        let mini_app_url = lookup("MINI_APP_URL");

        // --- Web ---
        let api_token = lookup("API_TOKEN").filter(|t| !t.is_empty());
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Scheduler ---
        let notifier_interval = secs(&lookup, "NOTIFIER_INTERVAL_SECS", 60)?;
        let followup_delay = secs(&lookup, "FOLLOWUP_DELAY_SECS", 60)?;
        let external_call_timeout = secs(&lookup, "EXTERNAL_CALL_TIMEOUT_SECS", 10)?;
        // Reminders match on the exact minute, so every minute needs a tick.
        let interval_secs = notifier_interval.as_secs();
        if interval_secs == 0 || 60 % interval_secs != 0 {
            return Err(ConfigError::InvalidValue(
                "NOTIFIER_INTERVAL_SECS".to_string(),
                format!("{} does not evenly divide 60", interval_secs),
            ));
        }

        let tz_str = lookup("LEDGER_RESET_TIMEZONE").unwrap_or_else(|| "Europe/Moscow".to_string());
        let ledger_reset_timezone = tz_str.parse::<Tz>().map_err(|_| {
            ConfigError::InvalidValue(
                "LEDGER_RESET_TIMEZONE".to_string(),
                format!("'{}' is not an IANA timezone", tz_str),
            )
        })?;

        Ok(Self {
            bind_address,
            log_level,
            database_url,
            data_dir,
            telegram_bot_token,
            telegram_api_url,
            mini_app_url,
            api_token,
            cors_origin,
            notifier_interval,
            followup_delay,
            external_call_timeout,
            ledger_reset_timezone,
        })
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}
