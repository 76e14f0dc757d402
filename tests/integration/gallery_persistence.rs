//! sled-backed gallery and ledger through the service and the CLI run context.

use super::test_utils::{image, local_request, CountingUploader, ScriptedProvider};
use genchain::auth::StaticToken;
use genchain::cli::{Commands, ConfigCommands, GalleryCommands, RunContext};
use genchain::config::{FreeTierConfig, GenChainConfig};
use genchain::credit::{CreditGate, FreeTierLedger};
use genchain::gallery::{GalleryStore, GenerationRecord, GenerationSettings, SledGallery};
use genchain::generation::GenerationService;
use genchain::error::GenerationError;
use genchain::notify::{CollectingNotifier, NoticeKind};
use genchain::pipeline::{Plan, Step};
use genchain::upload::ReferenceImage;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn chain_records_survive_restart_in_commit_order() {
    let dir = TempDir::new().unwrap();
    let chain_id = {
        let db = sled::open(dir.path()).unwrap();
        let gallery = Arc::new(SledGallery::from_db(db.clone()).unwrap());
        let ledger = Arc::new(FreeTierLedger::persistent(&FreeTierConfig::default(), &db).unwrap());
        let service = GenerationService::new(
            Arc::new(ScriptedProvider::new(vec![
                image("https://cdn.test/1.png", 1),
                image("https://cdn.test/2.png", 1),
                image("https://cdn.test/3.png", 1),
            ])),
            Arc::new(CountingUploader::default()),
            gallery.clone(),
            ledger,
            Arc::new(StaticToken::anonymous()),
            Arc::new(CollectingNotifier::new()),
        );
        let plan = Plan::new(
            vec![
                Step::new(1, vec!["a".into(), "b".into()]),
                Step::new(2, vec!["c".into()]),
            ],
            GenerationSettings::default(),
        )
        .unwrap();
        let summary = service
            .run_pipeline(&plan, ReferenceImage::Remote("https://cdn.test/r.png".into()))
            .await
            .unwrap();
        gallery.flush().unwrap();
        summary.chain_id
    };

    let db = sled::open(dir.path()).unwrap();
    let gallery = SledGallery::from_db(db.clone()).unwrap();
    let urls: Vec<_> = gallery.images().into_iter().filter_map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.test/1.png",
            "https://cdn.test/2.png",
            "https://cdn.test/3.png"
        ]
    );
    assert_eq!(gallery.unique_chains(), vec![chain_id]);
    assert_eq!(gallery.images().iter().filter(|r| r.is_final()).count(), 1);

    let ledger = FreeTierLedger::persistent(&FreeTierConfig::default(), &db).unwrap();
    assert_eq!(
        ledger.can_use_free_tier().remaining,
        FreeTierConfig::default().limit - 1
    );
}

#[tokio::test]
async fn failed_generation_leaves_nothing_on_disk() {
    let dir = TempDir::new().unwrap();
    {
        let gallery = Arc::new(SledGallery::open(dir.path()).unwrap());
        let service = GenerationService::new(
            Arc::new(ScriptedProvider::new(vec![])),
            Arc::new(CountingUploader::default()),
            gallery.clone(),
            Arc::new(FreeTierLedger::new(&FreeTierConfig::default())),
            Arc::new(StaticToken::bearer("t")),
            Arc::new(CollectingNotifier::new()),
        );
        assert!(service.generate(local_request("x", Some(3))).await.is_err());
        gallery.flush().unwrap();
    }
    assert!(SledGallery::open(dir.path()).unwrap().images().is_empty());
}

fn context(dir: &TempDir) -> RunContext {
    let mut config = GenChainConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    RunContext::from_config(dir.path().to_path_buf(), config).unwrap()
}

#[tokio::test]
async fn cli_generate_with_unreadable_reference_notifies() {
    let dir = TempDir::new().unwrap();
    let mut config = GenChainConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    let notifier = Arc::new(CollectingNotifier::new());
    let ctx =
        RunContext::with_notifier(dir.path().to_path_buf(), config, notifier.clone()).unwrap();

    let missing = dir.path().join("missing.png");
    let err = ctx
        .execute(&Commands::Generate {
            prompt: "a lighthouse".to_string(),
            images: vec![missing.display().to_string()],
            max_images: None,
            model: None,
            aspect_ratio: None,
            resolution: None,
            seed: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::UploadFailed(_)));
    let notice = notifier.last().expect("failure should be notified");
    assert_eq!(notice.kind, NoticeKind::Error);
    assert!(ctx.gallery().images().is_empty());
}

#[tokio::test]
async fn cli_gallery_commands_read_and_edit_the_store() {
    let dir = TempDir::new().unwrap();
    let record = GenerationRecord::generated(
        "https://cdn.test/kept.png",
        "a quiet street",
        &GenerationSettings::default(),
        4,
    );
    let record_id = record.id.to_string();
    {
        let ctx = context(&dir);
        ctx.gallery().add_image(record);
        ctx.gallery().flush().unwrap();
    }

    let ctx = context(&dir);
    let listed = ctx
        .execute(&Commands::Gallery {
            command: GalleryCommands::List {
                tag: None,
                chain: None,
                format: "json".to_string(),
            },
        })
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&listed).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["records"][0]["prompt"], "a quiet street");

    let stats = ctx
        .execute(&Commands::Gallery {
            command: GalleryCommands::Stats,
        })
        .await
        .unwrap();
    assert!(stats.contains("Credits used"));

    let removed = ctx
        .execute(&Commands::Gallery {
            command: GalleryCommands::Remove { id: record_id.clone() },
        })
        .await
        .unwrap();
    assert!(removed.starts_with("Removed"));
    let again = ctx
        .execute(&Commands::Gallery {
            command: GalleryCommands::Remove { id: record_id },
        })
        .await
        .unwrap();
    assert!(again.starts_with("No record"));
    assert_eq!(ctx.gallery().total_images(), 0);
}

#[tokio::test]
async fn cli_config_show_masks_api_key() {
    let dir = TempDir::new().unwrap();
    let mut config = GenChainConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    config.provider.api_key = Some("secret-key".to_string());
    let ctx = RunContext::from_config(dir.path().to_path_buf(), config).unwrap();

    let shown = ctx
        .execute(&Commands::Config {
            command: ConfigCommands::Show,
        })
        .await
        .unwrap();
    assert!(!shown.contains("secret-key"));
    let parsed: GenChainConfig = toml::from_str(&shown).unwrap();
    assert_eq!(parsed.timeouts, ctx.config().timeouts);
}
