//! Session configuration
//!
//! Layered: built-in defaults → optional JSON file → `EXAM_*` environment
//! variables (with `.env` support) → CLI flags applied by the binary.

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{
    DEFAULT_BASE_URL, EXAM_DURATION_SECS, MAX_SUBMIT_ATTEMPTS, MAX_VIOLATIONS,
    PRESENCE_INTERVAL_MS, REQUEST_TIMEOUT_SECS, SUBMIT_RETRY_BACKOFF_MS, TICK_INTERVAL_MS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamConfig {
    /// Exam length in seconds
    pub duration_secs: u64,
    /// Violations before forced submission
    pub max_violations: u32,
    pub tick_interval_ms: u64,
    pub presence_interval_ms: u64,
    /// Automatic transport attempts made by the host loop
    pub max_submit_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Exam backend base URL
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Fixed seed for question order; random when unset
    pub shuffle_seed: Option<u64>,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            duration_secs: EXAM_DURATION_SECS,
            max_violations: MAX_VIOLATIONS,
            tick_interval_ms: TICK_INTERVAL_MS,
            presence_interval_ms: PRESENCE_INTERVAL_MS,
            max_submit_attempts: MAX_SUBMIT_ATTEMPTS,
            retry_backoff_ms: SUBMIT_RETRY_BACKOFF_MS,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            shuffle_seed: None,
        }
    }
}

impl ExamConfig {
    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `EXAM_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Apply `EXAM_*` environment overrides on top of `self`
    pub fn with_env(mut self) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        if let Some(v) = env_parse("EXAM_DURATION_SECS")? {
            self.duration_secs = v;
        }
        if let Some(v) = env_parse("EXAM_MAX_VIOLATIONS")? {
            self.max_violations = v;
        }
        if let Some(v) = env_parse("EXAM_TICK_INTERVAL_MS")? {
            self.tick_interval_ms = v;
        }
        if let Some(v) = env_parse("EXAM_PRESENCE_INTERVAL_MS")? {
            self.presence_interval_ms = v;
        }
        if let Some(v) = env_parse("EXAM_MAX_SUBMIT_ATTEMPTS")? {
            self.max_submit_attempts = v;
        }
        if let Some(v) = env_parse("EXAM_RETRY_BACKOFF_MS")? {
            self.retry_backoff_ms = v;
        }
        if let Ok(url) = env::var("EXAM_BASE_URL") {
            self.base_url = url;
        }
        if let Some(v) = env_parse("EXAM_REQUEST_TIMEOUT_SECS")? {
            self.request_timeout_secs = v;
        }
        if let Some(v) = env_parse("EXAM_SHUFFLE_SEED")? {
            self.shuffle_seed = Some(v);
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject settings the session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_secs == 0 {
            return Err(ConfigError::Invalid("duration_secs must be at least 1".into()));
        }
        if self.max_violations == 0 {
            return Err(ConfigError::Invalid("max_violations must be at least 1".into()));
        }
        if self.tick_interval_ms == 0 || self.presence_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be non-zero".into()));
        }
        if self.max_submit_attempts == 0 {
            return Err(ConfigError::Invalid("max_submit_attempts must be at least 1".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
