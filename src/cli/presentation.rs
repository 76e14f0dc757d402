//! CLI presentation: text and json formatters per command family.

mod config;
mod gallery;
mod generate;

pub use config::format_config_toml;
pub use gallery::{format_gallery_json, format_gallery_stats_text, format_gallery_text};
pub use generate::format_generate_outcome;
