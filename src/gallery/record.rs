//! Generation records: the artifacts (and placeholders) shown in the gallery.

use crate::types::{ChainId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag carried by every placeholder until its variation resolves.
pub const TAG_GENERATING: &str = "generating";
/// Tag carried by every record that belongs to a chain.
pub const TAG_PIPELINE: &str = "pipeline";
/// Tag carried by single-shot results.
pub const TAG_GENERATED: &str = "generated";

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Infer the media kind from the artifact URL's extension.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// Settings a generation call was made with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub aspect_ratio: String,
    pub resolution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_images: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            aspect_ratio: "1:1".to_string(),
            resolution: "1K".to_string(),
            seed: None,
            max_images: None,
        }
    }
}

impl GenerationSettings {
    /// Number of artifacts requested per call (at least one).
    pub fn image_count(&self) -> usize {
        self.max_images.unwrap_or(1).max(1) as usize
    }
}

/// Position of a record inside a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    pub chain_id: ChainId,
    /// 1-based step position.
    pub step_number: u32,
    pub total_steps: u32,
    /// 0-based position within the step.
    pub variation_index: u32,
    /// Variations in this step.
    pub total_variations: u32,
    pub is_final: bool,
}

impl ChainMetadata {
    pub fn is_last_variation(&self) -> bool {
        self.variation_index + 1 == self.total_variations
    }

    pub fn is_last_step(&self) -> bool {
        self.step_number == self.total_steps
    }

    /// Display tags derived from the chain position. Never parsed back.
    pub fn tags(&self) -> Vec<String> {
        vec![
            TAG_PIPELINE.to_string(),
            format!("pipeline-step-{}", self.step_number),
            format!("var-{}", self.variation_index),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: RecordId,
    /// Absent while the record is a placeholder.
    pub url: Option<String>,
    pub kind: MediaKind,
    pub prompt: String,
    pub model: String,
    pub settings: GenerationSettings,
    pub credits_used: u32,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainMetadata>,
}

impl GenerationRecord {
    /// A real single-shot artifact.
    pub fn generated(
        url: impl Into<String>,
        prompt: impl Into<String>,
        settings: &GenerationSettings,
        credits_used: u32,
    ) -> Self {
        let url = url.into();
        Self {
            id: RecordId::mint(),
            kind: MediaKind::from_url(&url),
            url: Some(url),
            prompt: prompt.into(),
            model: settings.model.clone(),
            settings: settings.clone(),
            credits_used,
            tags: vec![TAG_GENERATED.to_string()],
            created_at: Utc::now(),
            chain: None,
        }
    }

    /// A real artifact produced by one chain variation.
    pub fn chain_result(
        url: impl Into<String>,
        prompt: impl Into<String>,
        settings: &GenerationSettings,
        credits_used: u32,
        chain: ChainMetadata,
    ) -> Self {
        let url = url.into();
        Self {
            id: RecordId::mint(),
            kind: MediaKind::from_url(&url),
            url: Some(url),
            prompt: prompt.into(),
            model: settings.model.clone(),
            settings: settings.clone(),
            credits_used,
            tags: chain.tags(),
            created_at: Utc::now(),
            chain: Some(chain),
        }
    }

    /// Placeholder for a pending chain variation.
    pub fn chain_placeholder(
        prompt: impl Into<String>,
        settings: &GenerationSettings,
        chain: ChainMetadata,
    ) -> Self {
        let mut tags = vec![TAG_GENERATING.to_string()];
        tags.extend(chain.tags());
        Self {
            id: RecordId::placeholder(&chain.chain_id, chain.step_number, chain.variation_index),
            url: None,
            kind: MediaKind::Image,
            prompt: prompt.into(),
            model: settings.model.clone(),
            settings: settings.clone(),
            credits_used: 0,
            tags,
            created_at: Utc::now(),
            chain: Some(chain),
        }
    }

    /// Placeholder for one slot of a single-shot batch.
    pub fn batch_placeholder(
        id: RecordId,
        prompt: impl Into<String>,
        settings: &GenerationSettings,
    ) -> Self {
        Self {
            id,
            url: None,
            kind: MediaKind::Image,
            prompt: prompt.into(),
            model: settings.model.clone(),
            settings: settings.clone(),
            credits_used: 0,
            tags: vec![TAG_GENERATING.to_string()],
            created_at: Utc::now(),
            chain: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.has_tag(TAG_GENERATING)
    }

    pub fn is_final(&self) -> bool {
        self.chain.as_ref().is_some_and(|chain| chain.is_final)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
