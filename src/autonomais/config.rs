// SPDX-License-Identifier: MIT

//! Environment-driven settings
//!
//! `.env` files are loaded by the binary through `dotenv`; this module only
//! reads the process environment.

use crate::adk::error::{ConfigError, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MODEL_NAME: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_STEPS: usize = 100;

/// Settings for the model adapter
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            temperature: 0.0,
            top_p: 0.0,
            timeout_secs: 120,
        }
    }
}

impl ModelSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_key: lookup("OPENAI_API_KEY"),
            base_url: lookup("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model_name: lookup("MODEL_NAME").unwrap_or(defaults.model_name),
            temperature: parse_or(&lookup, "MODEL_TEMPERATURE", defaults.temperature)?,
            top_p: parse_or(&lookup, "MODEL_TOP_P", defaults.top_p)?,
            timeout_secs: parse_or(&lookup, "MODEL_TIMEOUT_SECS", defaults.timeout_secs)?,
        })
    }
}

/// Settings for running workflows
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub max_steps: usize,
    pub checkpoint_db: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            checkpoint_db: None,
        }
    }
}

impl RunSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let max_steps = parse_or(&lookup, "AUTONOMAIS_MAX_STEPS", DEFAULT_MAX_STEPS)?;
        if max_steps == 0 {
            return Err(ConfigError::Invalid("AUTONOMAIS_MAX_STEPS must be positive".to_string()).into());
        }
        Ok(Self {
            max_steps,
            checkpoint_db: lookup("AUTONOMAIS_CHECKPOINT_DB").map(PathBuf::from),
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{} has an invalid value: {}", key, raw)).into()),
    }
}
