//! CLI domain: parse, route, help, output, and presentation only.
//! No domain orchestration; the route table dispatches to the generation service and gallery.

mod help;
mod notifier;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::command_name;
pub use notifier::TerminalNotifier;
pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands, GalleryCommands};
pub use presentation::{
    format_config_toml, format_gallery_json, format_gallery_stats_text, format_gallery_text,
    format_generate_outcome,
};
pub use route::RunContext;
