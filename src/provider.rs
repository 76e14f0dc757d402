//! Generation Provider Abstraction
//!
//! Unified interface for the image/video generation backend. One call takes a prompt plus
//! reference image URLs and answers with artifacts, or with a pipeline plan to run step by step.
//! Failure bodies are classified into the transient / content-policy / rejected categories here so
//! every caller sees the same taxonomy.

use crate::error::{GenerationError, TimedOperation};
use crate::gallery::GenerationSettings;
use crate::pipeline::plan::PipelineSpec;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Error code the provider uses for prompts rejected by its safety system.
pub const CONTENT_POLICY_CODE: &str = "content_policy_violation";
const CONTENT_POLICY_MARKERS: &[&str] = &["content policy", "policy violation", "safety system"];

/// Provider request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderRequest {
    pub prompt: String,
    pub reference_images: Vec<String>,
    pub model: String,
    pub aspect_ratio: String,
    pub resolution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_images: Option<u32>,
}

impl ProviderRequest {
    pub fn new(
        prompt: impl Into<String>,
        reference_images: Vec<String>,
        settings: &GenerationSettings,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            reference_images,
            model: settings.model.clone(),
            aspect_ratio: settings.aspect_ratio.clone(),
            resolution: settings.resolution.clone(),
            seed: settings.seed,
            max_images: settings.max_images,
        }
    }
}

/// One artifact returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderImage {
    pub url: String,
    /// Expanded prompt this artifact was actually generated from.
    pub prompt: Option<String>,
    pub variation_index: Option<u32>,
}

/// Successful provider response
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub images: Vec<ProviderImage>,
    pub is_pipeline: bool,
    pub pipeline: Option<PipelineSpec>,
    pub credits_used: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireImage {
    Url(String),
    Detailed {
        url: String,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default, rename = "variationIndex")]
        variation_index: Option<u32>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSuccess {
    #[serde(default)]
    images: Vec<WireImage>,
    #[serde(default)]
    is_pipeline: bool,
    #[serde(default)]
    pipeline_result: Option<PipelineSpec>,
    #[serde(default)]
    credits_used: Option<u32>,
}

#[derive(Deserialize)]
struct WireFailure {
    error: String,
    #[serde(default)]
    retry: bool,
    #[serde(default)]
    code: Option<String>,
}

/// Generation provider client trait
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Issue one generation call.
    async fn generate(
        &self,
        request: &ProviderRequest,
        auth_token: Option<&str>,
    ) -> Result<ProviderResponse, GenerationError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Run one provider call bounded by `timeout`. An elapsed timeout abandons the call.
pub async fn generate_with_timeout(
    provider: &dyn GenerationProvider,
    request: &ProviderRequest,
    auth_token: Option<&str>,
    timeout: Duration,
) -> Result<ProviderResponse, GenerationError> {
    tokio::time::timeout(timeout, provider.generate(request, auth_token))
        .await
        .map_err(|_| GenerationError::Timeout {
            operation: TimedOperation::Generation,
            after: timeout,
        })?
}

pub fn is_content_policy(code: Option<&str>, message: &str) -> bool {
    if code.is_some_and(|code| code.eq_ignore_ascii_case(CONTENT_POLICY_CODE)) {
        return true;
    }
    let lowered = message.to_ascii_lowercase();
    CONTENT_POLICY_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn classify_failure(status: Option<u16>, failure: WireFailure) -> GenerationError {
    if is_content_policy(failure.code.as_deref(), &failure.error) {
        return GenerationError::ContentPolicy(failure.error);
    }
    let server_side = status.is_some_and(|s| s >= 500 || s == 429);
    if failure.retry || server_side {
        GenerationError::ProviderTransient {
            status,
            message: failure.error,
        }
    } else {
        GenerationError::ProviderRejected {
            status,
            message: failure.error,
        }
    }
}

/// Classify a raw provider answer. Zero artifacts without a pipeline is an empty result.
pub fn parse_provider_body(status: u16, body: &str) -> Result<ProviderResponse, GenerationError> {
    if !(200..300).contains(&status) {
        let failure = serde_json::from_str::<WireFailure>(body).unwrap_or_else(|_| WireFailure {
            error: if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            },
            retry: false,
            code: None,
        });
        return Err(classify_failure(Some(status), failure));
    }

    if let Ok(failure) = serde_json::from_str::<WireFailure>(body) {
        return Err(classify_failure(None, failure));
    }

    let success: WireSuccess = serde_json::from_str(body)
        .map_err(|e| GenerationError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    let images: Vec<ProviderImage> = success
        .images
        .into_iter()
        .map(|image| match image {
            WireImage::Url(url) => ProviderImage {
                url,
                prompt: None,
                variation_index: None,
            },
            WireImage::Detailed {
                url,
                prompt,
                variation_index,
            } => ProviderImage {
                url,
                prompt: prompt.filter(|p| !p.trim().is_empty()),
                variation_index,
            },
        })
        .filter(|image| !image.url.trim().is_empty())
        .collect();

    if images.is_empty() && !success.is_pipeline {
        return Err(GenerationError::EmptyResult);
    }

    Ok(ProviderResponse {
        images,
        is_pipeline: success.is_pipeline,
        pipeline: success.pipeline_result,
        credits_used: success.credits_used,
    })
}

fn map_http_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() {
        GenerationError::ProviderTransient {
            status: None,
            message: format!("Request timeout: {}", error),
        }
    } else if error.is_connect() {
        GenerationError::ProviderTransient {
            status: None,
            message: format!("Connection error: {}", error),
        }
    } else {
        GenerationError::ProviderTransient {
            status: error.status().map(|s| s.as_u16()),
            message: format!("HTTP error: {}", error),
        }
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP provider client: `POST {endpoint}` with a JSON [`ProviderRequest`].
pub struct HttpProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    async fn generate(
        &self,
        request: &ProviderRequest,
        auth_token: Option<&str>,
    ) -> Result<ProviderResponse, GenerationError> {
        let mut http = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(token) = auth_token {
            http = http.bearer_auth(token);
        }
        if let Some(key) = &self.api_key {
            http = http.header("x-api-key", key);
        }

        let response = http.send().await.map_err(map_http_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_http_error)?;
        debug!(status, bytes = body.len(), "Provider responded");
        parse_provider_body(status, &body)
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
