//! Pipeline chains end to end: placeholders, propagation, finality, failure cleanup.

use super::test_utils::{image, Harness, ScriptedProvider};
use genchain::auth::StaticToken;
use genchain::error::{ErrorCategory, GenerationError};
use genchain::gallery::{GalleryQuery, GalleryStore, GenerationSettings, InMemoryGallery};
use genchain::notify::{CollectingNotifier, NoticeKind};
use genchain::pipeline::{ChainState, PipelineExecutor, Plan, Step};
use genchain::upload::ReferenceImage;
use std::sync::Arc;
use std::time::Duration;

const INITIAL: &str = "https://cdn.test/initial.png";

fn plan(variations: &[usize]) -> Plan {
    let steps = variations
        .iter()
        .enumerate()
        .map(|(i, count)| {
            Step::new(
                i as u32 + 1,
                (0..*count)
                    .map(|v| format!("step {} variation {}", i + 1, v))
                    .collect(),
            )
        })
        .collect();
    Plan::new(steps, GenerationSettings::default()).unwrap()
}

fn executor(
    provider: Arc<ScriptedProvider>,
    gallery: Arc<InMemoryGallery>,
) -> (PipelineExecutor, Arc<CollectingNotifier>) {
    let notifier = Arc::new(CollectingNotifier::new());
    (
        PipelineExecutor::new(provider, gallery, notifier.clone()),
        notifier,
    )
}

#[tokio::test]
async fn two_variation_step_feeds_its_last_variation_forward() {
    let gallery = Arc::new(InMemoryGallery::new());
    let provider = Arc::new(
        ScriptedProvider::new(vec![
            image("https://cdn.test/s1v0.png", 2),
            image("https://cdn.test/s1v1.png", 2),
            image("https://cdn.test/s2v0.png", 3),
        ])
        .observing(gallery.clone()),
    );
    let (executor, notifier) = executor(provider.clone(), gallery.clone());

    let summary = executor
        .execute(&plan(&[2, 1]), INITIAL, Some("token"))
        .await
        .unwrap();

    // all three placeholders exist before the first call resolves
    assert_eq!(provider.placeholder_counts()[0], 3);
    assert_eq!(summary.records.len(), 3);
    assert_eq!(summary.state, ChainState::Completed);
    assert_eq!(summary.credits_used, 7);
    assert_eq!(gallery.total_images(), 3);
    assert!(gallery
        .query(&GalleryQuery::new().chain(&summary.chain_id).placeholders_only())
        .is_empty());

    let requests = provider.requests();
    assert_eq!(requests[0].reference_images, vec![INITIAL.to_string()]);
    assert_eq!(requests[1].reference_images, vec![INITIAL.to_string()]);
    assert_eq!(
        requests[2].reference_images,
        vec!["https://cdn.test/s1v1.png".to_string()]
    );
    assert!(requests.iter().all(|r| r.max_images == Some(1)));

    let finals: Vec<_> = summary.records.iter().filter(|r| r.is_final()).collect();
    assert_eq!(finals.len(), 1);
    assert_eq!(finals[0].url.as_deref(), Some("https://cdn.test/s2v0.png"));
    assert_eq!(
        summary.final_record().and_then(|r| r.chain.as_ref()).map(|c| c.step_number),
        Some(2)
    );

    let notice = notifier.last().unwrap();
    assert_eq!(notice.kind, NoticeKind::Success);
    assert!(notice.message.contains("3 images across 2 steps"));
}

#[tokio::test]
async fn records_carry_chain_position_and_tags() {
    let gallery = Arc::new(InMemoryGallery::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        image("https://cdn.test/a.png", 1),
        image("https://cdn.test/b.png", 1),
    ]));
    let (executor, _) = executor(provider, gallery.clone());

    let summary = executor.execute(&plan(&[1, 1]), INITIAL, None).await.unwrap();

    let step_two = gallery.query(&GalleryQuery::new().chain(&summary.chain_id).step(2));
    assert_eq!(step_two.len(), 1);
    let chain = step_two[0].chain.as_ref().unwrap();
    assert_eq!(chain.total_steps, 2);
    assert_eq!(chain.variation_index, 0);
    assert!(step_two[0].has_tag("pipeline"));
    assert!(step_two[0].has_tag("pipeline-step-2"));
    assert!(step_two[0].has_tag("var-0"));
    assert!(!step_two[0].has_tag("generating"));
    assert_eq!(gallery.get_images_by_tag("pipeline").len(), 2);
    assert_eq!(gallery.unique_chains(), vec![summary.chain_id.clone()]);
}

#[tokio::test]
async fn server_error_in_second_step_aborts_and_keeps_first_step() {
    let gallery = Arc::new(InMemoryGallery::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        image("https://cdn.test/s1.png", 1),
        Err(GenerationError::ProviderTransient {
            status: Some(503),
            message: "service unavailable".to_string(),
        }),
    ]));
    let (executor, notifier) = executor(provider.clone(), gallery.clone());

    let err = executor
        .execute(&plan(&[1, 1]), INITIAL, None)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Transient);
    assert!(err.is_retryable());
    assert_eq!(gallery.len(), 1);
    let kept = &gallery.images()[0];
    assert_eq!(kept.url.as_deref(), Some("https://cdn.test/s1.png"));
    assert!(!kept.is_final());
    assert!(gallery
        .query(&GalleryQuery::new().placeholders_only())
        .is_empty());

    let notice = notifier.last().unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice, err.notice());
}

#[tokio::test]
async fn failing_variation_stops_before_next_step() {
    let gallery = Arc::new(InMemoryGallery::new());
    let provider = Arc::new(ScriptedProvider::new(vec![
        image("https://cdn.test/s1v0.png", 1),
        Err(GenerationError::ContentPolicy("flagged".to_string())),
        image("https://cdn.test/never.png", 1),
    ]));
    let (executor, _) = executor(provider.clone(), gallery.clone());

    let err = executor
        .execute(&plan(&[3, 2]), INITIAL, None)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::ContentPolicy);
    assert!(!err.is_retryable());
    // step 1 variation 2 and all of step 2 are never requested
    assert_eq!(provider.calls(), 2);
    assert_eq!(gallery.len(), 1);
}

#[tokio::test]
async fn deleted_placeholder_is_appended_on_commit() {
    let gallery = Arc::new(InMemoryGallery::new());
    let provider = Arc::new(
        ScriptedProvider::new(vec![image("https://cdn.test/only.png", 1)])
            .with_delay(Duration::from_millis(20)),
    );
    let (executor, _) = executor(provider, gallery.clone());

    let deleting_gallery = gallery.clone();
    let deleter = async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        for record in deleting_gallery.query(&GalleryQuery::new().placeholders_only()) {
            deleting_gallery.remove_image(&record.id);
        }
    };
    let chain_plan = plan(&[1]);
    let (result, _) = tokio::join!(executor.execute(&chain_plan, INITIAL, None), deleter);

    let summary = result.unwrap();
    assert_eq!(gallery.len(), 1);
    assert_eq!(gallery.images()[0].id, summary.records[0].id);
}

#[tokio::test(start_paused = true)]
async fn hung_step_times_out_and_clears_chain_placeholders() {
    let gallery = Arc::new(InMemoryGallery::new());
    let provider = Arc::new(
        ScriptedProvider::new(vec![image("https://cdn.test/late.png", 1)])
            .with_delay(Duration::from_secs(600)),
    );
    let notifier = Arc::new(CollectingNotifier::new());
    let executor = PipelineExecutor::new(provider, gallery.clone(), notifier.clone())
        .with_call_timeout(Duration::from_secs(30));

    let err = executor
        .execute(&plan(&[2, 2]), INITIAL, None)
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert!(gallery.is_empty());
}

#[tokio::test]
async fn explicit_pipeline_run_checks_free_tier_once() {
    let harness = Harness::new(
        vec![
            image("https://cdn.test/a.png", 1),
            image("https://cdn.test/b.png", 1),
            image("https://cdn.test/c.png", 1),
            image("https://cdn.test/d.png", 1),
        ],
        StaticToken::anonymous(),
        3,
    );

    let summary = harness
        .service
        .run_pipeline(
            &plan(&[2, 2]),
            ReferenceImage::Remote(INITIAL.to_string()),
        )
        .await
        .unwrap();

    assert_eq!(summary.records.len(), 4);
    assert_eq!(harness.gate.checks(), 1);
    assert_eq!(harness.uploader.uploads(), 0);
}
