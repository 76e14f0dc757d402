//! Config loading entry point.

use super::merge::merge_policy;
use super::sources::{env, global_file, workspace_file};
use super::GenChainConfig;
use crate::error::GenerationError;
use config::{ConfigError, File};
use std::path::Path;
use tracing::debug;

/// Loads [`GenChainConfig`] from layered sources.
///
/// Precedence (lowest to highest): defaults, global file, workspace files (or one explicit
/// file), environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    include_global: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            env_prefix: env::DEFAULT_PREFIX.to_string(),
            include_global: true,
        }
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn without_global_file(mut self) -> Self {
        self.include_global = false;
        self
    }

    /// Load using the default sources for `workspace_root`.
    pub fn load(workspace_root: &Path) -> Result<GenChainConfig, ConfigError> {
        Self::default().load_workspace(workspace_root)
    }

    /// Load with `path` standing in for the global and workspace files.
    pub fn load_from_file(path: &Path) -> Result<GenChainConfig, ConfigError> {
        Self::default().load_file(path)
    }

    pub fn load_workspace(&self, workspace_root: &Path) -> Result<GenChainConfig, ConfigError> {
        let mut builder = merge_policy::builder_with_defaults()?;
        if self.include_global {
            builder = global_file::add_to_builder(builder);
        }
        builder = workspace_file::add_to_builder(builder, workspace_root);
        builder = env::add_to_builder(builder, &self.env_prefix);
        debug!(workspace = %workspace_root.display(), "Loading configuration");
        builder.build()?.try_deserialize()
    }

    pub fn load_file(&self, path: &Path) -> Result<GenChainConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path).required(true));
        let builder = env::add_to_builder(builder, &self.env_prefix);
        debug!(config_path = %path.display(), "Loading configuration");
        builder.build()?.try_deserialize()
    }

    /// Load and validate, folding every validation error into one message.
    pub fn load_checked(
        &self,
        workspace_root: &Path,
        explicit_file: Option<&Path>,
    ) -> Result<GenChainConfig, GenerationError> {
        let config = match explicit_file {
            Some(path) => self.load_file(path)?,
            None => self.load_workspace(workspace_root)?,
        };
        config.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            GenerationError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                messages.join("\n")
            ))
        })?;
        Ok(config)
    }
}
