//! Environment source: `GENCHAIN_FREE_TIER__LIMIT=3` sets `free_tier.limit`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

pub const DEFAULT_PREFIX: &str = "GENCHAIN";

pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    prefix: &str,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}
