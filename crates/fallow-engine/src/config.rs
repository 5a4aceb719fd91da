// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the expiry engine.

use std::path::PathBuf;

/// Engine configuration loaded from environment variables.
///
/// Every knob has a default; an empty environment yields a dry-run engine
/// with production thresholds.
#[derive(Debug, Clone)]
pub struct Config {
    /// Apply changes. False means every action is only logged.
    pub live: bool,
    /// Cumulative compute hours a trial project may consume.
    pub usage_cap_hours: f64,
    /// Archive attempts per resource before the project is parked.
    pub max_archive_attempts: u32,
    /// Days an administrative shutdown must age before an unforced delete.
    pub delete_retention_days: u32,
    /// Project name prefix marking personal trial projects.
    pub trial_prefix: String,
    /// State snapshot the CLI operates on, unless given on the command line.
    pub state_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let live = std::env::var("FALLOW_LIVE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let usage_cap_hours: f64 = std::env::var("FALLOW_USAGE_CAP_HOURS")
            .unwrap_or_else(|_| "4383".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FALLOW_USAGE_CAP_HOURS"))?;
        if !usage_cap_hours.is_finite() || usage_cap_hours <= 0.0 {
            return Err(ConfigError::InvalidValue("FALLOW_USAGE_CAP_HOURS"));
        }

        let max_archive_attempts: u32 = std::env::var("FALLOW_MAX_ARCHIVE_ATTEMPTS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FALLOW_MAX_ARCHIVE_ATTEMPTS"))?;
        if max_archive_attempts == 0 {
            return Err(ConfigError::InvalidValue("FALLOW_MAX_ARCHIVE_ATTEMPTS"));
        }

        let delete_retention_days: u32 = std::env::var("FALLOW_DELETE_RETENTION_DAYS")
            .unwrap_or_else(|_| "90".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FALLOW_DELETE_RETENTION_DAYS"))?;

        let trial_prefix =
            std::env::var("FALLOW_TRIAL_PREFIX").unwrap_or_else(|_| "pt-".to_string());

        let state_file = std::env::var("FALLOW_STATE_FILE").ok().map(PathBuf::from);

        Ok(Self {
            live,
            usage_cap_hours,
            max_archive_attempts,
            delete_retention_days,
            trial_prefix,
            state_file,
        })
    }
}

impl Default for Config {
    /// Production thresholds with dry-run enabled.
    fn default() -> Self {
        Self {
            live: false,
            usage_cap_hours: 4383.0,
            max_archive_attempts: 10,
            delete_retention_days: 90,
            trial_prefix: "pt-".to_string(),
            state_file: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable holds a value that does not parse or is out
    /// of range.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
