//! Configuration for `nauka`.
//!
//! Values come from a TOML file under the user's config directory (or the
//! file named by `NAUKA_CONFIG`). Every field has a default, so a missing or
//! partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const APP_DIR: &str = "nauka";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DB_NAME: &str = "nauka.db";

pub const CONFIG_ENV: &str = "NAUKA_CONFIG";
pub const DB_ENV: &str = "NAUKA_DB";
pub const LOG_ENV: &str = "NAUKA_LOG";

/// Upper bound for any configured interval, roughly a century
pub const MAX_INTERVAL_LIMIT: i64 = 36_500;

/// Storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit database file; falls back to the config directory
    pub db_path: Option<String>,
    /// How many times a busy/locked write is retried
    pub busy_retries: u32,
    /// First backoff delay in milliseconds, doubled per retry
    pub retry_base_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_retries: 5,
            retry_base_ms: 25,
        }
    }
}

/// Spaced-repetition tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrsConfig {
    pub initial_ease: f64,
    pub min_ease: f64,
    pub max_ease: f64,
    pub first_interval_days: i64,
    pub second_interval_days: i64,
    /// Extra interval multiplier for a perfect (quality 5) recall
    pub easy_bonus: f64,
    pub max_interval_days: i64,
    /// Interval after a failed recall
    pub relearn_interval_days: i64,
    /// Weight of the latest attempt in the mastery moving average
    pub mastery_alpha: f64,
    /// Consecutive successes needed to leave the learning state
    pub graduate_repetitions: i32,
    pub mastered_threshold: f64,
    pub mastered_min_interval_days: i64,
    /// Hours past due before a concept counts as overdue
    pub overdue_after_hours: i64,
}

impl SrsConfig {
    /// Reject settings the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        let floats = [
            ("initial_ease", self.initial_ease),
            ("min_ease", self.min_ease),
            ("max_ease", self.max_ease),
            ("easy_bonus", self.easy_bonus),
            ("mastery_alpha", self.mastery_alpha),
            ("mastered_threshold", self.mastered_threshold),
        ];
        for (name, value) in floats {
            if !value.is_finite() {
                return Err(Error::invalid(format!("srs.{name} must be a finite number")));
            }
        }

        if self.min_ease <= 0.0 {
            return Err(Error::invalid("srs.min_ease must be positive"));
        }
        if self.min_ease > self.max_ease {
            return Err(Error::invalid(format!(
                "srs.min_ease ({}) is greater than srs.max_ease ({})",
                self.min_ease, self.max_ease
            )));
        }
        if !(self.min_ease..=self.max_ease).contains(&self.initial_ease) {
            return Err(Error::invalid(format!(
                "srs.initial_ease ({}) must lie between {} and {}",
                self.initial_ease, self.min_ease, self.max_ease
            )));
        }
        if self.easy_bonus < 1.0 {
            return Err(Error::invalid("srs.easy_bonus must be at least 1.0"));
        }

        if !(1..=MAX_INTERVAL_LIMIT).contains(&self.max_interval_days) {
            return Err(Error::invalid(format!(
                "srs.max_interval_days must be between 1 and {MAX_INTERVAL_LIMIT}"
            )));
        }
        let intervals = [
            ("first_interval_days", self.first_interval_days),
            ("second_interval_days", self.second_interval_days),
            ("relearn_interval_days", self.relearn_interval_days),
        ];
        for (name, days) in intervals {
            if !(1..=self.max_interval_days).contains(&days) {
                return Err(Error::invalid(format!(
                    "srs.{name} ({days}) must be between 1 and srs.max_interval_days ({})",
                    self.max_interval_days
                )));
            }
        }
        if !(0..=MAX_INTERVAL_LIMIT).contains(&self.mastered_min_interval_days) {
            return Err(Error::invalid(format!(
                "srs.mastered_min_interval_days must be between 0 and {MAX_INTERVAL_LIMIT}"
            )));
        }

        if !(0.0..=1.0).contains(&self.mastery_alpha) {
            return Err(Error::invalid("srs.mastery_alpha must be between 0 and 1"));
        }
        if !(0.0..=100.0).contains(&self.mastered_threshold) {
            return Err(Error::invalid("srs.mastered_threshold must be between 0 and 100"));
        }
        if self.graduate_repetitions < 1 {
            return Err(Error::invalid("srs.graduate_repetitions must be at least 1"));
        }
        if self.overdue_after_hours < 0 {
            return Err(Error::invalid("srs.overdue_after_hours must not be negative"));
        }

        Ok(())
    }
}

impl Default for SrsConfig {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            min_ease: 1.3,
            max_ease: 3.0,
            first_interval_days: 1,
            second_interval_days: 6,
            easy_bonus: 1.3,
            max_interval_days: 365,
            relearn_interval_days: 1,
            mastery_alpha: 0.3,
            graduate_repetitions: 2,
            mastered_threshold: 85.0,
            mastered_min_interval_days: 21,
            overdue_after_hours: 24,
        }
    }
}

/// Practice session sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub review_limit: usize,
    pub new_limit: usize,
    pub drill_limit: usize,
    /// Show a failed concept again at the end of a review session
    pub requeue_failed: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            review_limit: 20,
            new_limit: 5,
            drill_limit: 10,
            requeue_failed: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub srs: SrsConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the `nauka` directory under the platform config dir
    ///
    /// Returns:
    /// - Linux: `~/.config/nauka`
    /// - macOS: `~/Library/Application Support/nauka`
    /// - Windows: `%APPDATA%\nauka`
    pub fn app_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    pub fn config_path() -> PathBuf {
        Self::config_path_from(std::env::var(CONFIG_ENV).ok())
    }

    /// `env` is the value of `NAUKA_CONFIG`; empty counts as unset
    pub fn config_path_from(env: Option<String>) -> PathBuf {
        match env {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => Self::app_dir().join(CONFIG_FILE_NAME),
        }
    }

    /// Parse and validate
    pub fn from_toml(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.srs.validate()
    }

    pub fn to_toml(&self) -> String {
        // Every field is a plain value, serialization cannot fail
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Resolve the database path: `NAUKA_DB`, then `storage.db_path`,
    /// then the default file in the app directory.
    pub fn db_path(&self) -> PathBuf {
        self.db_path_with(std::env::var(DB_ENV).ok())
    }

    /// Same as [`Config::db_path`] with the `NAUKA_DB` value passed in
    pub fn db_path_with(&self, env: Option<String>) -> PathBuf {
        if let Some(path) = env.filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }

        if let Some(path) = &self.storage.db_path {
            return PathBuf::from(path);
        }

        let dir = Self::app_dir();
        fs::create_dir_all(&dir).ok();
        dir.join(DEFAULT_DB_NAME)
    }
}
