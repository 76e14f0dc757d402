//! Single-shot generate entry point: pre-flight, upload, provider call, result handling.
//! A response that signals a pipeline is handed to the pipeline executor; callers use this
//! service only and never orchestrate uploads, placeholders, or the executor themselves.

use crate::auth::TokenSource;
use crate::config::TimeoutConfig;
use crate::credit::CreditGate;
use crate::error::GenerationError;
use crate::gallery::{GalleryStore, GenerationRecord, GenerationSettings};
use crate::notify::{Notice, Notifier};
use crate::pipeline::{ChainSummary, PipelineExecutor, Plan};
use crate::provider::{generate_with_timeout, GenerationProvider, ProviderRequest, ProviderResponse};
use crate::types::{next_batch_id, RecordId};
use crate::upload::{resolve_references, ReferenceImage, UploadAdapter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request for a single generate run.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub reference_images: Vec<ReferenceImage>,
    pub settings: GenerationSettings,
}

#[derive(Debug, Clone)]
pub enum GenerateOutcome {
    /// Independent artifacts from one call, in provider order.
    Single(Vec<GenerationRecord>),
    /// The provider answered with a plan that ran as a chain.
    Pipeline(ChainSummary),
}

impl GenerateOutcome {
    pub fn records(&self) -> &[GenerationRecord] {
        match self {
            GenerateOutcome::Single(records) => records,
            GenerateOutcome::Pipeline(summary) => &summary.records,
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Authorization decided once per top-level action.
struct Authorization {
    token: Option<String>,
    uses_free_tier: bool,
}

/// Split `total` credits over `parts` records so the shares sum to `total`.
pub fn split_credits(total: u32, parts: usize) -> Vec<u32> {
    if parts == 0 {
        return Vec::new();
    }
    let parts_u32 = parts as u32;
    let base = total / parts_u32;
    let remainder = (total % parts_u32) as usize;
    (0..parts)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

pub struct GenerationService {
    provider: Arc<dyn GenerationProvider>,
    uploader: Arc<dyn UploadAdapter>,
    gallery: Arc<dyn GalleryStore>,
    credit_gate: Arc<dyn CreditGate>,
    tokens: Arc<dyn TokenSource>,
    notifier: Arc<dyn Notifier>,
    executor: PipelineExecutor,
    upload_timeout: Duration,
    generation_timeout: Duration,
    in_flight: AtomicBool,
}

impl GenerationService {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        uploader: Arc<dyn UploadAdapter>,
        gallery: Arc<dyn GalleryStore>,
        credit_gate: Arc<dyn CreditGate>,
        tokens: Arc<dyn TokenSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let timeouts = TimeoutConfig::default();
        let executor = PipelineExecutor::new(
            Arc::clone(&provider),
            Arc::clone(&gallery),
            Arc::clone(&notifier),
        )
        .with_call_timeout(timeouts.generation());
        Self {
            provider,
            uploader,
            gallery,
            credit_gate,
            tokens,
            notifier,
            executor,
            upload_timeout: timeouts.upload(),
            generation_timeout: timeouts.generation(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_timeouts(mut self, timeouts: &TimeoutConfig) -> Self {
        self.upload_timeout = timeouts.upload();
        self.generation_timeout = timeouts.generation();
        self.executor = self.executor.with_call_timeout(self.generation_timeout);
        self
    }

    pub fn gallery(&self) -> &Arc<dyn GalleryStore> {
        &self.gallery
    }

    /// Whether a top-level action is currently running.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// One prompt to one or more artifacts, or a pipeline run when the provider asks for one.
    pub async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerateOutcome, GenerationError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Generate ignored: another generation is in flight");
            return Err(GenerationError::AlreadyInFlight);
        };

        if request.prompt.trim().is_empty() {
            return Err(self.fail(GenerationError::Validation(
                "Enter a prompt to generate.".to_string(),
            )));
        }
        if request.reference_images.is_empty() {
            return Err(self.fail(GenerationError::Validation(
                "Add at least one reference image.".to_string(),
            )));
        }

        let auth = self.authorize().await.map_err(|e| self.fail(e))?;
        let token = auth.token.as_deref();

        let slots = request.settings.image_count();
        let batch = next_batch_id();
        let placeholder_ids: Vec<RecordId> = (0..slots)
            .map(|slot| RecordId::batch_placeholder(batch, slot))
            .collect();
        for id in &placeholder_ids {
            self.gallery.add_image(GenerationRecord::batch_placeholder(
                id.clone(),
                request.prompt.clone(),
                &request.settings,
            ));
        }
        info!(
            batch,
            slots,
            references = request.reference_images.len(),
            "Generation started"
        );

        let (reference_urls, response) = match self.call_provider(&request, token).await {
            Ok(answer) => answer,
            Err(err) => {
                self.discard(&placeholder_ids);
                return Err(self.fail(err));
            }
        };

        if response.is_pipeline {
            self.discard(&placeholder_ids);
            let summary = self
                .hand_off_to_pipeline(&request, &reference_urls, response, token)
                .await?;
            self.record_free_tier_use(&auth);
            return Ok(GenerateOutcome::Pipeline(summary));
        }
        if response.images.is_empty() {
            self.discard(&placeholder_ids);
            return Err(self.fail(GenerationError::EmptyResult));
        }

        let records = self.commit_batch(&request, response, &placeholder_ids);
        self.record_free_tier_use(&auth);
        info!(batch, committed = records.len(), "Generation completed");
        self.notifier.notify(Notice::success(
            "Generation complete",
            format!("Generated {} images", records.len()),
        ));
        Ok(GenerateOutcome::Single(records))
    }

    /// Run an explicit plan as one top-level action (one free-tier check for the whole chain).
    pub async fn run_pipeline(
        &self,
        plan: &Plan,
        initial_reference: ReferenceImage,
    ) -> Result<ChainSummary, GenerationError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("Pipeline run ignored: another generation is in flight");
            return Err(GenerationError::AlreadyInFlight);
        };
        plan.validate().map_err(|e| self.fail(e))?;

        let auth = self.authorize().await.map_err(|e| self.fail(e))?;
        let token = auth.token.as_deref();
        let reference = resolve_references(
            self.uploader.as_ref(),
            std::slice::from_ref(&initial_reference),
            token,
            self.upload_timeout,
        )
        .await
        .map_err(|e| self.fail(e))?;
        let initial_url = reference.into_iter().next().ok_or_else(|| {
            self.fail(GenerationError::Validation(
                "Add at least one reference image.".to_string(),
            ))
        })?;

        let summary = self.executor.execute(plan, &initial_url, token).await?;
        self.record_free_tier_use(&auth);
        Ok(summary)
    }

    async fn authorize(&self) -> Result<Authorization, GenerationError> {
        let token = self.tokens.auth_token().await;
        if token.is_some() {
            return Ok(Authorization {
                token,
                uses_free_tier: false,
            });
        }
        let status = self.credit_gate.can_use_free_tier();
        if !status.allowed {
            return Err(GenerationError::FreeTierExhausted {
                remaining: status.remaining,
                reset_at: status.reset_at,
                resets_in: self.credit_gate.format_reset_time(status.reset_at),
            });
        }
        debug!(remaining = status.remaining, "Free tier generation authorized");
        Ok(Authorization {
            token: None,
            uses_free_tier: true,
        })
    }

    fn record_free_tier_use(&self, auth: &Authorization) {
        if auth.uses_free_tier {
            self.credit_gate.increment_free_tier_usage();
        }
    }

    /// Upload references, then issue the provider call. Returns the resolved reference URLs
    /// alongside the response so a pipeline handoff can reuse them.
    async fn call_provider(
        &self,
        request: &GenerateRequest,
        token: Option<&str>,
    ) -> Result<(Vec<String>, ProviderResponse), GenerationError> {
        let reference_urls = resolve_references(
            self.uploader.as_ref(),
            &request.reference_images,
            token,
            self.upload_timeout,
        )
        .await?;
        let provider_request = ProviderRequest::new(
            request.prompt.clone(),
            reference_urls.clone(),
            &request.settings,
        );
        let response = generate_with_timeout(
            self.provider.as_ref(),
            &provider_request,
            token,
            self.generation_timeout,
        )
        .await?;
        Ok((reference_urls, response))
    }

    async fn hand_off_to_pipeline(
        &self,
        request: &GenerateRequest,
        reference_urls: &[String],
        response: ProviderResponse,
        token: Option<&str>,
    ) -> Result<ChainSummary, GenerationError> {
        let spec = response.pipeline.ok_or_else(|| {
            self.fail(GenerationError::InvalidResponse(
                "Pipeline response carried no pipelineResult".to_string(),
            ))
        })?;
        let plan = Plan::from_spec(&spec, request.settings.clone()).map_err(|e| self.fail(e))?;
        let initial_reference = reference_urls.first().ok_or_else(|| {
            self.fail(GenerationError::UploadFailed(
                "No reference url to seed the pipeline".to_string(),
            ))
        })?;
        info!(
            steps = plan.total_steps(),
            variations = plan.total_variations(),
            "Provider requested a pipeline"
        );
        debug!(
            planning_credits = response.credits_used.unwrap_or(0),
            "Planning call billed"
        );
        self.executor.execute(&plan, initial_reference, token).await
    }

    fn commit_batch(
        &self,
        request: &GenerateRequest,
        response: ProviderResponse,
        placeholder_ids: &[RecordId],
    ) -> Vec<GenerationRecord> {
        let shares = split_credits(response.credits_used.unwrap_or(0), response.images.len());
        let mut records = Vec::with_capacity(response.images.len());
        for (slot, (image, credits)) in response.images.into_iter().zip(shares).enumerate() {
            let prompt = image.prompt.unwrap_or_else(|| request.prompt.clone());
            let record = GenerationRecord::generated(image.url, prompt, &request.settings, credits);
            match placeholder_ids.get(slot) {
                Some(placeholder) => {
                    self.gallery.replace_image(placeholder, record.clone());
                }
                None => self.gallery.add_image(record.clone()),
            }
            records.push(record);
        }
        if records.len() < placeholder_ids.len() {
            self.discard(&placeholder_ids[records.len()..]);
        }
        records
    }

    fn discard(&self, placeholder_ids: &[RecordId]) {
        for id in placeholder_ids {
            self.gallery.remove_image(id);
        }
    }

    fn fail(&self, err: GenerationError) -> GenerationError {
        warn!(error = %err, category = ?err.category(), "Generation failed");
        self.notifier.notify(err.notice());
        err
    }
}
