use crate::config::GenChainConfig;
use crate::error::GenerationError;

/// Effective configuration as TOML. The API key is masked.
pub fn format_config_toml(config: &GenChainConfig) -> Result<String, GenerationError> {
    let mut shown = config.clone();
    if shown.provider.api_key.is_some() {
        shown.provider.api_key = Some("********".to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| GenerationError::ConfigError(format!("Failed to render config: {}", e)))
}
