//! Runtime configuration for embedding applications.
//!
//! ```ignore
//! let config = CoreConfig::from_json_str(r#"{"log_dir": "/var/log/app", "retry": {"retries": 5}}"#)?;
//! config.init_logging()?;
//! let found = repo.get_by_id_continuously(id, ALL_COLUMNS, &config.retry)?;
//! ```

use crate::error::RepoError;
use crate::logging::{default_log_level, init_logging};
use crate::repo::RetryPolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// Absolute directory for log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl CoreConfig {
    /// Parses JSON and validates the retry budget.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config
            .retry
            .validate()
            .map_err(ConfigError::InvalidRetryPolicy)?;
        Ok(config)
    }

    /// Starts file logging when `log_dir` is set.
    ///
    /// Returns whether a sink is active afterwards.
    pub fn init_logging(&self) -> Result<bool, String> {
        match &self.log_dir {
            Some(dir) => init_logging(&self.log_level, dir).map(|_| true),
            None => Ok(false),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    InvalidRetryPolicy(RepoError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid configuration: {err}"),
            Self::InvalidRetryPolicy(err) => write!(f, "invalid retry policy: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidRetryPolicy(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
