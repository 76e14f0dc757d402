//! Upload adapter: turns local reference files into remote URLs the provider can read.

use crate::error::{GenerationError, TimedOperation};
use async_trait::async_trait;
use futures::future::try_join_all;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// A reference image supplied by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceImage {
    /// Already hosted; passed to the provider as-is.
    Remote(String),
    /// Local file that must be uploaded first.
    Local(LocalReference),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReference {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl LocalReference {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            mime_type: mime_for(&file_name).to_string(),
            file_name,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, GenerationError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            GenerationError::UploadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "reference".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

impl ReferenceImage {
    /// Interpret a CLI-style argument: `http(s)://` URLs stay remote, anything else is a path.
    pub async fn from_arg(arg: &str) -> Result<Self, GenerationError> {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Ok(ReferenceImage::Remote(arg.to_string()))
        } else {
            Ok(ReferenceImage::Local(
                LocalReference::from_path(Path::new(arg)).await?,
            ))
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

#[async_trait]
pub trait UploadAdapter: Send + Sync {
    /// Upload one file and return its public URL.
    async fn upload(
        &self,
        file: &LocalReference,
        auth_token: Option<&str>,
    ) -> Result<String, GenerationError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

/// Multipart uploader: `POST {endpoint}` with a `file` part, answers `{ "url": ... }`.
pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .build()
            .map_err(|e| GenerationError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl UploadAdapter for HttpUploader {
    async fn upload(
        &self,
        file: &LocalReference,
        auth_token: Option<&str>,
    ) -> Result<String, GenerationError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| GenerationError::UploadFailed(format!("Invalid mime type: {}", e)))?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GenerationError::UploadFailed(format!("Upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::UploadFailed(format!(
                "Upload failed with status {}: {}",
                status, body
            )));
        }

        let parsed: UploadResponse = response.json().await.map_err(|e| {
            GenerationError::UploadFailed(format!("Failed to parse upload response: {}", e))
        })?;
        if parsed.url.trim().is_empty() {
            return Err(GenerationError::UploadFailed(
                "Upload response contained an empty url".to_string(),
            ));
        }
        Ok(parsed.url)
    }
}

/// Resolve every reference to a URL, uploading local files concurrently. Each upload is bounded
/// by its own `upload_timeout`; output order matches input order.
pub async fn resolve_references(
    uploader: &dyn UploadAdapter,
    references: &[ReferenceImage],
    auth_token: Option<&str>,
    upload_timeout: Duration,
) -> Result<Vec<String>, GenerationError> {
    let pending = references.iter().map(|reference| async move {
        match reference {
            ReferenceImage::Remote(url) => Ok(url.clone()),
            ReferenceImage::Local(file) => {
                debug!(file = %file.file_name, size = file.bytes.len(), "Uploading reference");
                tokio::time::timeout(upload_timeout, uploader.upload(file, auth_token))
                    .await
                    .map_err(|_| GenerationError::Timeout {
                        operation: TimedOperation::Upload,
                        after: upload_timeout,
                    })?
            }
        }
    });
    try_join_all(pending).await
}
