//! Pipeline executor: runs a plan step by step against a generation provider.
//! Owns placeholder lifecycle, propagation of each step's result, and chain-wide cleanup on
//! failure; provider transport and gallery storage stay in their domains.

use crate::error::GenerationError;
use crate::gallery::{ChainMetadata, GalleryQuery, GalleryStore, GenerationRecord};
use crate::notify::{Notice, Notifier};
use crate::pipeline::plan::Plan;
use crate::provider::{generate_with_timeout, GenerationProvider, ProviderRequest};
use crate::types::{ChainId, RecordId};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a chain is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    PlaceholdersInserted,
    InFlight { step: u32, variation: u32 },
    Committed { step: u32, variation: u32 },
    Completed,
    Aborted,
}

/// Outcome of a fully successful chain.
#[derive(Debug, Clone)]
pub struct ChainSummary {
    pub chain_id: ChainId,
    pub total_steps: u32,
    pub total_variations: usize,
    /// Committed records in commit order.
    pub records: Vec<GenerationRecord>,
    pub credits_used: u64,
    pub state: ChainState,
}

impl ChainSummary {
    pub fn final_record(&self) -> Option<&GenerationRecord> {
        self.records.iter().find(|record| record.is_final())
    }
}

struct ChainRun {
    chain_id: ChainId,
    state: ChainState,
}

impl ChainRun {
    fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            state: ChainState::Idle,
        }
    }

    fn advance(&mut self, next: ChainState) {
        debug!(chain_id = %self.chain_id, from = ?self.state, to = ?next, "Chain state");
        self.state = next;
    }
}

/// Executes pipeline plans. Variations are issued strictly one at a time, so a chain never has
/// more than one provider call in flight.
pub struct PipelineExecutor {
    provider: Arc<dyn GenerationProvider>,
    gallery: Arc<dyn GalleryStore>,
    notifier: Arc<dyn Notifier>,
    call_timeout: Duration,
}

impl PipelineExecutor {
    const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        gallery: Arc<dyn GalleryStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            provider,
            gallery,
            notifier,
            call_timeout: Self::DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Run `plan` starting from `initial_reference_url`.
    ///
    /// Placeholders for every variation are inserted before the first call. On failure the
    /// chain's remaining placeholders are removed and the failure is surfaced; records already
    /// committed for completed variations stay in the gallery.
    pub async fn execute(
        &self,
        plan: &Plan,
        initial_reference_url: &str,
        auth_token: Option<&str>,
    ) -> Result<ChainSummary, GenerationError> {
        plan.validate()?;
        let mut run = ChainRun::new(ChainId::mint());
        let total_steps = plan.total_steps();
        let total_variations = plan.total_variations();
        info!(
            chain_id = %run.chain_id,
            total_steps,
            total_variations,
            provider = self.provider.provider_name(),
            "Pipeline started"
        );

        self.insert_placeholders(&run.chain_id, plan);
        run.advance(ChainState::PlaceholdersInserted);

        match self
            .run_steps(&mut run, plan, initial_reference_url, auth_token)
            .await
        {
            Ok(records) => {
                run.advance(ChainState::Completed);
                let credits_used = records.iter().map(|r| u64::from(r.credits_used)).sum();
                info!(
                    chain_id = %run.chain_id,
                    committed = records.len(),
                    credits_used,
                    "Pipeline completed"
                );
                self.notifier.notify(Notice::success(
                    "Pipeline complete",
                    format!(
                        "Generated {} images across {} steps",
                        records.len(),
                        total_steps
                    ),
                ));
                Ok(ChainSummary {
                    chain_id: run.chain_id,
                    total_steps,
                    total_variations,
                    records,
                    credits_used,
                    state: run.state,
                })
            }
            Err(err) => {
                run.advance(ChainState::Aborted);
                let removed = self.discard_placeholders(&run.chain_id);
                warn!(
                    chain_id = %run.chain_id,
                    removed_placeholders = removed,
                    error = %err,
                    "Pipeline aborted"
                );
                self.notifier.notify(err.notice());
                Err(err)
            }
        }
    }

    fn insert_placeholders(&self, chain_id: &ChainId, plan: &Plan) {
        let total_steps = plan.total_steps();
        for step in &plan.steps {
            let total_variations = step.variations.len() as u32;
            for (index, prompt) in step.variations.iter().enumerate() {
                self.gallery.add_image(GenerationRecord::chain_placeholder(
                    prompt.clone(),
                    &plan.settings,
                    ChainMetadata {
                        chain_id: chain_id.clone(),
                        step_number: step.step_number,
                        total_steps,
                        variation_index: index as u32,
                        total_variations,
                        is_final: false,
                    },
                ));
            }
        }
    }

    async fn run_steps(
        &self,
        run: &mut ChainRun,
        plan: &Plan,
        initial_reference_url: &str,
        auth_token: Option<&str>,
    ) -> Result<Vec<GenerationRecord>, GenerationError> {
        let mut settings = plan.settings.clone();
        settings.max_images = Some(1);

        let mut current_reference = initial_reference_url.to_string();
        let mut committed_steps: HashSet<u32> = HashSet::new();
        let mut records = Vec::with_capacity(plan.total_variations());
        let mut queue = plan.dependency_queue();

        while let Some(node) = queue.pop_front() {
            if let Some(dependency) = node.depends_on {
                if !committed_steps.contains(&dependency) {
                    return Err(GenerationError::InvalidPlan(format!(
                        "Step {} scheduled before step {} committed",
                        node.step_number, dependency
                    )));
                }
            }
            let step = plan.step(node.step_number).ok_or_else(|| {
                GenerationError::InvalidPlan(format!("Unknown step {}", node.step_number))
            })?;
            let total_variations = step.variations.len() as u32;

            for (index, prompt) in step.variations.iter().enumerate() {
                let mut chain = ChainMetadata {
                    chain_id: run.chain_id.clone(),
                    step_number: step.step_number,
                    total_steps: plan.total_steps(),
                    variation_index: index as u32,
                    total_variations,
                    is_final: false,
                };
                run.advance(ChainState::InFlight {
                    step: chain.step_number,
                    variation: chain.variation_index,
                });

                let request =
                    ProviderRequest::new(prompt.clone(), vec![current_reference.clone()], &settings);
                let response = generate_with_timeout(
                    self.provider.as_ref(),
                    &request,
                    auth_token,
                    self.call_timeout,
                )
                .await?;
                let image = response
                    .images
                    .into_iter()
                    .next()
                    .ok_or(GenerationError::EmptyResult)?;

                if chain.is_last_variation() {
                    current_reference = image.url.clone();
                    chain.is_final = chain.is_last_step();
                }

                let placeholder_id =
                    RecordId::placeholder(&run.chain_id, chain.step_number, chain.variation_index);
                let record = GenerationRecord::chain_result(
                    image.url,
                    image.prompt.unwrap_or_else(|| prompt.clone()),
                    &settings,
                    response.credits_used.unwrap_or(0),
                    chain,
                );
                self.gallery.replace_image(&placeholder_id, record.clone());
                run.advance(ChainState::Committed {
                    step: step.step_number,
                    variation: index as u32,
                });
                records.push(record);
            }

            committed_steps.insert(step.step_number);
        }

        Ok(records)
    }

    /// Remove every placeholder still tagged with `chain_id`. Returns how many were removed.
    fn discard_placeholders(&self, chain_id: &ChainId) -> usize {
        let pending = self
            .gallery
            .query(&GalleryQuery::new().chain(chain_id).placeholders_only());
        pending
            .iter()
            .filter(|record| self.gallery.remove_image(&record.id))
            .count()
    }
}
