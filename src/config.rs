//! Configuration System
//!
//! Layered configuration: built-in defaults, the global file, workspace files, then `GENCHAIN_*`
//! environment variables. `validate()` reports every problem at once.

use crate::gallery::GenerationSettings;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenChainConfig {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub free_tier: FreeTierConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Generation backend endpoints and request defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_upload_endpoint")]
    pub upload_endpoint: String,

    /// Sent as `x-api-key` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub defaults: GenerationSettings,
}

fn default_endpoint() -> String {
    "http://localhost:8787/api/generate".to_string()
}

fn default_upload_endpoint() -> String {
    "http://localhost:8787/api/upload".to_string()
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            upload_endpoint: default_upload_endpoint(),
            api_key: None,
            defaults: GenerationSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per reference upload
    #[serde(default = "default_upload_secs")]
    pub upload_secs: u64,

    /// Per provider call, including each pipeline step call
    #[serde(default = "default_generation_secs")]
    pub generation_secs: u64,
}

fn default_upload_secs() -> u64 {
    30
}

fn default_generation_secs() -> u64 {
    120
}

impl TimeoutConfig {
    pub fn upload(&self) -> Duration {
        Duration::from_secs(self.upload_secs)
    }

    pub fn generation(&self) -> Duration {
        Duration::from_secs(self.generation_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upload_secs: default_upload_secs(),
            generation_secs: default_generation_secs(),
        }
    }
}

/// Unauthenticated allowance: `limit` generations per `window_hours`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTierConfig {
    #[serde(default = "default_free_limit")]
    pub limit: u32,

    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
}

fn default_free_limit() -> u32 {
    5
}

fn default_window_hours() -> u32 {
    24
}

impl Default for FreeTierConfig {
    fn default() -> Self {
        Self {
            limit: default_free_limit(),
            window_hours: default_window_hours(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root for the sled database and log files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }
}

pub(crate) fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "genchain")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".genchain"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Provider(String),
    Timeouts(String),
    FreeTier(String),
    Storage(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Provider(msg) => write!(f, "Provider: {}", msg),
            ValidationError::Timeouts(msg) => write!(f, "Timeouts: {}", msg),
            ValidationError::FreeTier(msg) => write!(f, "Free tier: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl GenChainConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if !is_http_url(&self.provider.endpoint) {
            errors.push(ValidationError::Provider(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.provider.endpoint
            )));
        }
        if !is_http_url(&self.provider.upload_endpoint) {
            errors.push(ValidationError::Provider(format!(
                "upload_endpoint must be an http(s) URL, got '{}'",
                self.provider.upload_endpoint
            )));
        }
        if self.provider.defaults.model.trim().is_empty() {
            errors.push(ValidationError::Provider(
                "default model cannot be empty".to_string(),
            ));
        }
        if self.provider.defaults.max_images == Some(0) {
            errors.push(ValidationError::Provider(
                "default max_images must be at least 1".to_string(),
            ));
        }

        if self.timeouts.upload_secs == 0 {
            errors.push(ValidationError::Timeouts(
                "upload_secs must be greater than 0".to_string(),
            ));
        }
        if self.timeouts.upload_secs >= self.timeouts.generation_secs {
            errors.push(ValidationError::Timeouts(format!(
                "upload_secs ({}) must be below generation_secs ({})",
                self.timeouts.upload_secs, self.timeouts.generation_secs
            )));
        }

        if self.free_tier.limit == 0 {
            errors.push(ValidationError::FreeTier(
                "limit must be greater than 0".to_string(),
            ));
        }
        if self.free_tier.window_hours == 0 {
            errors.push(ValidationError::FreeTier(
                "window_hours must be greater than 0".to_string(),
            ));
        }

        if self.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "data_dir cannot be empty".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
