//! Command-name contract for logging.

use crate::cli::parse::{Commands, ConfigCommands, GalleryCommands};

/// Command name string for log fields (e.g. "generate", "gallery.list").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Generate { .. } => "generate".to_string(),
        Commands::Gallery { command } => format!("gallery.{}", gallery_command_name(command)),
        Commands::Config { command } => format!("config.{}", config_command_name(command)),
    }
}

pub fn gallery_command_name(command: &GalleryCommands) -> &'static str {
    match command {
        GalleryCommands::List { .. } => "list",
        GalleryCommands::Stats => "stats",
        GalleryCommands::Remove { .. } => "remove",
    }
}

pub fn config_command_name(command: &ConfigCommands) -> &'static str {
    match command {
        ConfigCommands::Show => "show",
    }
}
