//! Merge rules: defaults first, then file sources in order, environment last.

use config::builder::DefaultState;
use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let data_dir = crate::config::default_data_dir();
    Config::builder()
        .set_default("timeouts.upload_secs", 30)?
        .set_default("timeouts.generation_secs", 120)?
        .set_default("free_tier.limit", 5)?
        .set_default("free_tier.window_hours", 24)?
        .set_default("storage.data_dir", data_dir.to_string_lossy().to_string())
}
