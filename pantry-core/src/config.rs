//! Agent configuration
//!
//! Resolution order, later layers win:
//! 1. built-in defaults
//! 2. TOML file (`--config`, else `<config_dir>/pantry/config.toml`)
//! 3. environment (`.env` is loaded first)
//! 4. command-line overrides, applied by the caller with [`AgentConfig::merge`]

use crate::error::{Error, Result};
use crate::provider::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "pantry";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_MAX_TOKENS: usize = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Layered configuration. Every field is optional so layers can be merged;
/// the accessors fill in defaults.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub save_data: Option<bool>,
    pub data_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Load defaults, the config file and the environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::config_invalid(format!(
                        "config file {} does not exist",
                        path.display()
                    )));
                }
                Self::load_from_file(path)?
            }
            None => match default_config_file() {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };

        let merged = file.merge(&Self::from_env()?);
        merged.validate()?;
        Ok(merged)
    }

    /// Read a TOML config file; a missing file yields the empty config
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config_invalid(format!("failed to read config file: {}", e))
                .with_context("path", path.display().to_string())
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::config_invalid(format!("failed to parse config file: {}", e))
                .with_context("path", path.display().to_string())
        })
    }

    /// Read the `OPENAI_*`, `SAVE_USER_DATA` and `DATA_DIR` variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| var(name).filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_key: non_empty("OPENAI_API_KEY"),
            base_url: non_empty("OPENAI_BASE_URL"),
            model: non_empty("OPENAI_MODEL"),
            max_tokens: non_empty("OPENAI_MAX_TOKENS")
                .map(|v| parse_var("OPENAI_MAX_TOKENS", &v))
                .transpose()?,
            temperature: non_empty("OPENAI_TEMPERATURE")
                .map(|v| parse_var("OPENAI_TEMPERATURE", &v))
                .transpose()?,
            timeout_secs: non_empty("OPENAI_TIMEOUT_SECS")
                .map(|v| parse_var("OPENAI_TIMEOUT_SECS", &v))
                .transpose()?,
            save_data: non_empty("SAVE_USER_DATA").map(|v| parse_bool(&v)),
            data_dir: non_empty("DATA_DIR").map(PathBuf::from),
        })
    }

    /// Merge with another config, preferring values from `other` when present
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            api_key: other.api_key.clone().or_else(|| self.api_key.clone()),
            base_url: other.base_url.clone().or_else(|| self.base_url.clone()),
            model: other.model.clone().or_else(|| self.model.clone()),
            max_tokens: other.max_tokens.or(self.max_tokens),
            temperature: other.temperature.or(self.temperature),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            save_data: other.save_data.or(self.save_data),
            data_dir: other.data_dir.clone().or_else(|| self.data_dir.clone()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let temperature = self.temperature();
        if !(0.0..=2.0).contains(&temperature) {
            return Err(Error::config_invalid(format!(
                "temperature must be between 0 and 2, got {}",
                temperature
            )));
        }
        if self.max_tokens() == 0 {
            return Err(Error::config_invalid("max_tokens must be greater than 0"));
        }
        if self.timeout_secs() == 0 {
            return Err(Error::config_invalid("timeout_secs must be greater than 0"));
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs())
    }

    pub fn save_data(&self) -> bool {
        self.save_data.unwrap_or(true)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Directory holding `profile.json` and `history.json`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_NAME)))
            .unwrap_or_else(|| PathBuf::from("./data"))
    }

    /// Provider settings. A missing key is only acceptable for a custom
    /// (local) endpoint.
    pub fn provider_config(&self) -> Result<ProviderConfig> {
        let config = match &self.api_key {
            Some(key) => ProviderConfig::openai(key.clone()).with_base_url(self.base_url()),
            None if self.base_url.is_some() => ProviderConfig::local(self.base_url(), self.model()),
            None => {
                return Err(Error::config_invalid(
                    "an API key is required: set OPENAI_API_KEY or add api_key to the config file",
                ))
            }
        };
        Ok(config.with_model(self.model()).with_timeout(self.timeout_secs()))
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("save_data", &self.save_data)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

/// `<config_dir>/pantry/config.toml`, if the platform has a config dir
pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join("config.toml"))
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        Error::config_invalid(format!("invalid value for {}: {}", name, e))
            .with_context("variable", name)
    })
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
