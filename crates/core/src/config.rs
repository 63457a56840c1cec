// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty or missing file
//! yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What a parallel node does when one of its children fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelFailurePolicy {
    /// Let the remaining siblings finish, then fail the parent
    #[default]
    WaitForSiblings,
    /// Cancel unfinished siblings and fail the parent at once
    CancelSiblings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Retries allowed per leaf after its first failed invocation
    pub retry_limit: u32,
    /// Base interval between driver checks of a waiting program
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Upper bound for exponential backoff on idle programs
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    pub parallel_failure: ParallelFailurePolicy,
    /// Save attempts per pass before surfacing a persistence error
    pub save_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_limit: 2,
            poll_interval: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            parallel_failure: ParallelFailurePolicy::WaitForSiblings,
            save_retries: 3,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no engine config, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be non-zero".into()));
        }
        if self.max_backoff < self.poll_interval {
            return Err(ConfigError::Invalid(
                "max_backoff must be at least poll_interval".into(),
            ));
        }
        if self.save_retries == 0 {
            return Err(ConfigError::Invalid("save_retries must be at least 1".into()));
        }
        Ok(())
    }

    /// Delay before the next check after `idle_polls` passes without progress
    pub fn backoff(&self, idle_polls: u32) -> Duration {
        let factor = 1u32.checked_shl(idle_polls.min(31)).unwrap_or(u32::MAX);
        self.poll_interval
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
