//! Integration tests for the configuration loader

use super::test_utils::with_env;
use genchain::config::{ConfigLoader, GenChainConfig};
use std::fs;
use tempfile::TempDir;

fn loader() -> ConfigLoader {
    ConfigLoader::new().without_global_file()
}

#[test]
fn test_load_from_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("genchain.toml");
    fs::write(
        &config_file,
        r#"
[provider]
endpoint = "https://api.example.test/generate"
upload_endpoint = "https://api.example.test/upload"

[provider.defaults]
model = "studio-v2"
aspect_ratio = "16:9"

[free_tier]
limit = 3
"#,
    )
    .unwrap();

    let config = loader().load_file(&config_file).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.provider.defaults.model, "studio-v2");
    assert_eq!(config.provider.defaults.resolution, "1K");
    assert_eq!(config.free_tier.limit, 3);
    assert_eq!(config.free_tier.window_hours, 24);
    assert_eq!(config.timeouts.generation_secs, 120);
}

#[test]
fn test_workspace_env_file_overrides_base() {
    let workspace = TempDir::new().unwrap();
    let config_dir = workspace.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[timeouts]\nupload_secs = 10\ngeneration_secs = 60\n",
    )
    .unwrap();
    fs::write(config_dir.join("staging.toml"), "[timeouts]\ngeneration_secs = 90\n").unwrap();

    let config = with_env(&[("GENCHAIN_ENV", Some("staging"))], || {
        loader()
            .with_env_prefix("GENCHAIN_CFGTEST_A")
            .load_workspace(workspace.path())
            .unwrap()
    });
    assert_eq!(config.timeouts.upload_secs, 10);
    assert_eq!(config.timeouts.generation_secs, 90);
}

#[test]
fn test_environment_overrides_files() {
    let workspace = TempDir::new().unwrap();
    let config_dir = workspace.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[free_tier]\nlimit = 3\n").unwrap();

    let config = with_env(
        &[
            ("GENCHAIN_CFGTEST_B_FREE_TIER__LIMIT", Some("9")),
            ("GENCHAIN_CFGTEST_B_PROVIDER__ENDPOINT", Some("https://env.example.test/g")),
        ],
        || {
            loader()
                .with_env_prefix("GENCHAIN_CFGTEST_B")
                .load_workspace(workspace.path())
                .unwrap()
        },
    );
    assert_eq!(config.free_tier.limit, 9);
    assert_eq!(config.provider.endpoint, "https://env.example.test/g");
}

#[test]
fn test_load_checked_reports_validation_errors() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    fs::write(
        &config_file,
        "[timeouts]\nupload_secs = 200\ngeneration_secs = 100\n\n[free_tier]\nlimit = 0\n",
    )
    .unwrap();

    let err = loader()
        .with_env_prefix("GENCHAIN_CFGTEST_C")
        .load_checked(temp_dir.path(), Some(&config_file))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("upload_secs"));
    assert!(message.contains("limit"));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    assert!(loader()
        .load_file(&temp_dir.path().join("absent.toml"))
        .is_err());
}

#[test]
fn test_empty_workspace_yields_defaults() {
    let workspace = TempDir::new().unwrap();
    let config = loader()
        .with_env_prefix("GENCHAIN_CFGTEST_D")
        .load_workspace(workspace.path())
        .unwrap();
    let defaults = GenChainConfig::default();
    assert_eq!(config.provider, defaults.provider);
    assert_eq!(config.timeouts, defaults.timeouts);
    assert_eq!(config.free_tier, defaults.free_tier);
}
