//! Placeholder and finality invariants over arbitrary plan shapes.

use async_trait::async_trait;
use genchain::error::GenerationError;
use genchain::gallery::{GalleryQuery, GalleryStore, GenerationSettings, InMemoryGallery};
use genchain::notify::CollectingNotifier;
use genchain::pipeline::{PipelineExecutor, Plan, Step};
use genchain::provider::{GenerationProvider, ProviderImage, ProviderRequest, ProviderResponse};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

/// Succeeds with a unique url per call, failing on call number `fail_at` when set.
struct CountingProvider {
    gallery: Arc<InMemoryGallery>,
    fail_at: Option<usize>,
    calls: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl GenerationProvider for CountingProvider {
    async fn generate(
        &self,
        request: &ProviderRequest,
        _auth_token: Option<&str>,
    ) -> Result<ProviderResponse, GenerationError> {
        let pending = self
            .gallery
            .images()
            .iter()
            .filter(|r| r.is_placeholder())
            .count();
        let call = {
            let mut calls = self.calls.lock();
            calls.push((request.prompt.clone(), pending));
            calls.len() - 1
        };
        if self.fail_at == Some(call) {
            return Err(GenerationError::ProviderTransient {
                status: Some(500),
                message: "boom".to_string(),
            });
        }
        Ok(ProviderResponse {
            images: vec![ProviderImage {
                url: format!("https://cdn.test/{}.png", call),
                prompt: None,
                variation_index: None,
            }],
            is_pipeline: false,
            pipeline: None,
            credits_used: Some(1),
        })
    }

    fn provider_name(&self) -> &str {
        "counting"
    }
}

fn plan(shape: &[usize]) -> Plan {
    let steps = shape
        .iter()
        .enumerate()
        .map(|(i, count)| {
            Step::new(
                i as u32 + 1,
                (0..*count).map(|v| format!("s{}v{}", i + 1, v)).collect(),
            )
        })
        .collect();
    Plan::new(steps, GenerationSettings::default()).unwrap()
}

fn run(shape: &[usize], fail_at: Option<usize>) -> (Arc<InMemoryGallery>, Arc<CountingProvider>, bool) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let gallery = Arc::new(InMemoryGallery::new());
    let provider = Arc::new(CountingProvider {
        gallery: gallery.clone(),
        fail_at,
        calls: Mutex::new(Vec::new()),
    });
    let executor = PipelineExecutor::new(
        provider.clone(),
        gallery.clone(),
        Arc::new(CollectingNotifier::new()),
    );
    let ok = runtime
        .block_on(executor.execute(&plan(shape), "https://cdn.test/ref.png", None))
        .is_ok();
    (gallery, provider, ok)
}

#[test]
fn test_successful_chain_shape_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(1usize..4, 1..5), |shape| {
            let total: usize = shape.iter().sum();
            let (gallery, provider, ok) = run(&shape, None);

            prop_assert!(ok);
            // every placeholder exists before the first call resolves
            prop_assert_eq!(provider.calls.lock()[0].1, total);
            prop_assert_eq!(gallery.total_images(), total);
            prop_assert!(gallery
                .query(&GalleryQuery::new().placeholders_only())
                .is_empty());

            let finals: Vec<_> = gallery.images().into_iter().filter(|r| r.is_final()).collect();
            prop_assert_eq!(finals.len(), 1);
            let chain = finals[0].chain.clone().unwrap();
            prop_assert_eq!(chain.step_number as usize, shape.len());
            prop_assert_eq!(chain.variation_index as usize + 1, shape[shape.len() - 1]);
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_failed_chain_cleanup_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let strategy = prop::collection::vec(1usize..4, 2..5).prop_flat_map(|shape| {
        let total: usize = shape.iter().sum();
        (Just(shape), 0..total)
    });

    runner
        .run(&strategy, |(shape, fail_at)| {
            let (gallery, provider, ok) = run(&shape, Some(fail_at));

            prop_assert!(!ok);
            // committed work is kept, nothing pending is left behind
            prop_assert_eq!(gallery.total_images(), fail_at);
            prop_assert!(gallery
                .query(&GalleryQuery::new().placeholders_only())
                .is_empty());
            prop_assert_eq!(provider.calls.lock().len(), fail_at + 1);

            // no call was issued for any step after the failing one
            let mut boundary = 0;
            let failing_step = shape
                .iter()
                .position(|count| {
                    boundary += count;
                    fail_at < boundary
                })
                .unwrap()
                + 1;
            let later_prefix = format!("s{}v", failing_step + 1);
            prop_assert!(provider
                .calls
                .lock()
                .iter()
                .all(|(prompt, _)| !prompt.starts_with(&later_prefix)));
            Ok(())
        })
        .unwrap();
}
