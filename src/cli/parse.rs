//! CLI parse: clap types for genchain. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// genchain CLI - prompt-driven image generation with multi-step pipelines
#[derive(Parser, Debug)]
#[command(name = "genchain")]
#[command(about = "Generate images from prompts and reference images, single-shot or as chained pipelines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (config/ is read from here)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate from a prompt and one or more reference images
    Generate {
        /// Text prompt
        #[arg(long, short)]
        prompt: String,
        /// Reference image: local path or http(s) URL. Repeatable.
        #[arg(long = "image", short = 'i', required = true)]
        images: Vec<String>,
        /// Number of artifacts to request
        #[arg(long)]
        max_images: Option<u32>,
        /// Model identifier
        #[arg(long)]
        model: Option<String>,
        /// Aspect ratio, e.g. 16:9
        #[arg(long)]
        aspect_ratio: Option<String>,
        /// Resolution, e.g. 2K
        #[arg(long)]
        resolution: Option<String>,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Inspect and edit the gallery
    Gallery {
        #[command(subcommand)]
        command: GalleryCommands,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum GalleryCommands {
    /// List records in display order
    List {
        /// Only records carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only records of this chain
        #[arg(long)]
        chain: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Totals: images, credits, chains
    Stats,
    /// Remove a record by id
    Remove {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}
