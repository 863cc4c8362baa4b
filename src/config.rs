use crate::application::{DispatcherSettings, LifecyclePolicy};
use chrono::TimeDelta;
use std::env;
use thiserror::Error;

pub const LOG_LEVEL: &str = "MECHCONNECT_LOG_LEVEL";
pub const BACK_JOB_WINDOW_DAYS: &str = "MECHCONNECT_BACK_JOB_WINDOW_DAYS";
pub const ALLOW_DIRECT_REQUOTE: &str = "MECHCONNECT_ALLOW_DIRECT_REQUOTE";
pub const NOTIFY_MAX_ATTEMPTS: &str = "MECHCONNECT_NOTIFY_MAX_ATTEMPTS";
pub const NOTIFY_RETENTION_HOURS: &str = "MECHCONNECT_NOTIFY_RETENTION_HOURS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of days, got '{value}'")]
    InvalidWindow { key: &'static str, value: String },
    #[error("{key} must be true or false, got '{value}'")]
    InvalidFlag { key: &'static str, value: String },
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidAttempts { key: &'static str, value: String },
    #[error("{key} must be a whole number of hours, got '{value}'")]
    InvalidRetention { key: &'static str, value: String },
}

/// Runtime configuration, from the environment (and a `.env` file if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    pub policy: LifecyclePolicy,
    pub dispatcher: DispatcherSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let log_level = lookup(LOG_LEVEL).unwrap_or_else(|| "info".to_string());

        let mut policy = LifecyclePolicy::default();
        if let Some(value) = lookup(BACK_JOB_WINDOW_DAYS) {
            policy.back_job_window = value
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|days| TimeDelta::try_days(i64::from(days)))
                .ok_or(ConfigError::InvalidWindow {
                    key: BACK_JOB_WINDOW_DAYS,
                    value,
                })?;
        }
        if let Some(value) = lookup(ALLOW_DIRECT_REQUOTE) {
            policy.allow_direct_requote = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidFlag {
                        key: ALLOW_DIRECT_REQUOTE,
                        value,
                    });
                }
            };
        }

        let mut dispatcher = DispatcherSettings::default();
        if let Some(value) = lookup(NOTIFY_MAX_ATTEMPTS) {
            dispatcher.max_attempts = value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidAttempts {
                    key: NOTIFY_MAX_ATTEMPTS,
                    value,
                })?;
        }
        if let Some(value) = lookup(NOTIFY_RETENTION_HOURS) {
            dispatcher.retention = value
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|hours| TimeDelta::try_hours(i64::from(hours)))
                .ok_or(ConfigError::InvalidRetention {
                    key: NOTIFY_RETENTION_HOURS,
                    value,
                })?;
        }

        Ok(Self {
            telemetry: TelemetryConfig { log_level },
            policy,
            dispatcher,
        })
    }
}
