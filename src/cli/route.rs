//! CLI route: single route table and run context. Dispatches to the generation service,
//! gallery and presentation.

use crate::auth::EnvToken;
use crate::cli::notifier::TerminalNotifier;
use crate::cli::parse::{Commands, ConfigCommands, GalleryCommands};
use crate::cli::presentation::{
    format_config_toml, format_gallery_json, format_gallery_stats_text, format_gallery_text,
    format_generate_outcome,
};
use crate::cli::command_name;
use crate::config::{ConfigLoader, GenChainConfig};
use crate::credit::FreeTierLedger;
use crate::error::{GenerationError, StorageError};
use crate::gallery::{GalleryQuery, GalleryStore, GenerationSettings, SledGallery};
use crate::generation::{GenerateRequest, GenerationService};
use crate::notify::Notifier;
use crate::provider::HttpProvider;
use crate::types::{ChainId, RecordId};
use crate::upload::{HttpUploader, ReferenceImage};
use futures::future::try_join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runtime context for CLI execution: config, the shared sled database, and domain services.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    config: GenChainConfig,
    workspace_root: PathBuf,
    gallery: Arc<SledGallery>,
    service: GenerationService,
    notifier: Arc<dyn Notifier>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, GenerationError> {
        let config = ConfigLoader::new().load_checked(&workspace_root, config_path.as_deref())?;
        Self::from_config(workspace_root, config)
    }

    pub fn from_config(
        workspace_root: PathBuf,
        config: GenChainConfig,
    ) -> Result<Self, GenerationError> {
        Self::with_notifier(workspace_root, config, Arc::new(TerminalNotifier))
    }

    /// Like `from_config`, with notices sent to `notifier` instead of the terminal.
    pub fn with_notifier(
        workspace_root: PathBuf,
        config: GenChainConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, GenerationError> {
        let db_path = config.storage.db_path();
        std::fs::create_dir_all(&db_path).map_err(StorageError::IoError)?;
        let db = sled::open(&db_path).map_err(|e| {
            StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to open sled database: {}", e),
            ))
        })?;

        let gallery = Arc::new(SledGallery::from_db(db.clone())?);
        let ledger = Arc::new(FreeTierLedger::persistent(&config.free_tier, &db)?);
        let provider = Arc::new(HttpProvider::new(
            config.provider.endpoint.clone(),
            config.provider.api_key.clone(),
        )?);
        let uploader = Arc::new(HttpUploader::new(config.provider.upload_endpoint.clone())?);

        let service = GenerationService::new(
            provider,
            uploader,
            gallery.clone(),
            ledger,
            Arc::new(EnvToken::default()),
            notifier.clone(),
        )
        .with_timeouts(&config.timeouts);

        Ok(Self {
            config,
            workspace_root,
            gallery,
            service,
            notifier,
        })
    }

    pub fn config(&self) -> &GenChainConfig {
        &self.config
    }

    pub fn gallery(&self) -> &SledGallery {
        &self.gallery
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, GenerationError> {
        let started = Instant::now();
        let name = command_name(command);
        let result = self.execute_inner(command).await;
        match &result {
            Ok(_) => info!(
                command = %name,
                workspace = %self.workspace_root.display(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Command completed"
            ),
            Err(e) => warn!(
                command = %name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "Command failed"
            ),
        }
        if let Err(e) = self.gallery.flush() {
            warn!(error = %e, "Failed to flush gallery");
        }
        result
    }

    async fn execute_inner(&self, command: &Commands) -> Result<String, GenerationError> {
        match command {
            Commands::Generate {
                prompt,
                images,
                max_images,
                model,
                aspect_ratio,
                resolution,
                seed,
            } => {
                let settings = self.settings_with_overrides(
                    *max_images,
                    model.as_deref(),
                    aspect_ratio.as_deref(),
                    resolution.as_deref(),
                    *seed,
                );
                // every generate failure reaches the notifier, including unreadable references
                let reference_images =
                    try_join_all(images.iter().map(|arg| ReferenceImage::from_arg(arg)))
                        .await
                        .map_err(|e| {
                            self.notifier.notify(e.notice());
                            e
                        })?;
                let outcome = self
                    .service
                    .generate(GenerateRequest {
                        prompt: prompt.clone(),
                        reference_images,
                        settings,
                    })
                    .await?;
                Ok(format_generate_outcome(&outcome))
            }
            Commands::Gallery { command } => self.handle_gallery(command),
            Commands::Config { command } => match command {
                ConfigCommands::Show => format_config_toml(&self.config),
            },
        }
    }

    fn handle_gallery(&self, command: &GalleryCommands) -> Result<String, GenerationError> {
        match command {
            GalleryCommands::List { tag, chain, format } => {
                let mut query = GalleryQuery::new();
                if let Some(tag) = tag {
                    query = query.tag(tag.as_str());
                }
                if let Some(chain) = chain {
                    query = query.chain(&ChainId::from(chain.as_str()));
                }
                let records = self.gallery.query(&query);
                match format.as_str() {
                    "json" => format_gallery_json(&records),
                    "text" => Ok(format_gallery_text(&records)),
                    other => Err(GenerationError::Validation(format!(
                        "Unknown format '{}' (expected text or json)",
                        other
                    ))),
                }
            }
            GalleryCommands::Stats => Ok(format_gallery_stats_text(self.gallery.as_ref())),
            GalleryCommands::Remove { id } => {
                if self.gallery.remove_image(&RecordId::from(id.as_str())) {
                    Ok(format!("Removed {}", id))
                } else {
                    Ok(format!("No record with id {}", id))
                }
            }
        }
    }

    fn settings_with_overrides(
        &self,
        max_images: Option<u32>,
        model: Option<&str>,
        aspect_ratio: Option<&str>,
        resolution: Option<&str>,
        seed: Option<u64>,
    ) -> GenerationSettings {
        let mut settings = self.config.provider.defaults.clone();
        if max_images.is_some() {
            settings.max_images = max_images;
        }
        if let Some(model) = model {
            settings.model = model.to_string();
        }
        if let Some(aspect_ratio) = aspect_ratio {
            settings.aspect_ratio = aspect_ratio.to_string();
        }
        if let Some(resolution) = resolution {
            settings.resolution = resolution.to_string();
        }
        if seed.is_some() {
            settings.seed = seed;
        }
        settings
    }
}
