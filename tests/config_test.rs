use std::time::Duration;

use secrecy::ExposeSecret;
use wpcf_migrate::config::{Config, ContentfulConfig, Settings, WordPressConfig};

// Environment mutation is process-wide, so every env assertion lives in
// this one test.
#[test]
fn config_from_env_loads_and_fails_fast() {
    unsafe {
        std::env::remove_var("CONTENTFUL_CMA_TOKEN");
        std::env::remove_var("CONTENTFUL_SPACE_ID");
        std::env::remove_var("CONTENTFUL_ENV_NAME");
        std::env::remove_var("WP_API_URL");
        std::env::set_var("BUILD_DIR", "");
    }

    assert!(ContentfulConfig::from_env().is_err());
    assert!(WordPressConfig::from_env().is_err());

    // Empty counts as unset, so the default applies.
    let config = Config::from_env();
    assert_eq!(config.build_dir, std::path::PathBuf::from("dist"));
    assert!(!config.log_level.is_empty());

    unsafe {
        std::env::set_var("CONTENTFUL_CMA_TOKEN", "cma-test-token");
        std::env::set_var("CONTENTFUL_SPACE_ID", "space123");
        std::env::set_var("WP_API_URL", "https://example.com/wp-json/wp/v2");
    }

    let contentful = ContentfulConfig::from_env().unwrap();
    assert_eq!(contentful.token.expose_secret(), "cma-test-token");
    assert_eq!(contentful.space_id, "space123");
    assert_eq!(contentful.environment, "master");

    let debug = format!("{contentful:?}");
    assert!(!debug.contains("cma-test-token"), "token leaked: {debug}");

    let wordpress = WordPressConfig::from_env().unwrap();
    assert_eq!(wordpress.api_url, "https://example.com/wp-json/wp/v2");

    unsafe {
        std::env::remove_var("CONTENTFUL_CMA_TOKEN");
        std::env::remove_var("CONTENTFUL_SPACE_ID");
        std::env::remove_var("WP_API_URL");
        std::env::remove_var("BUILD_DIR");
    }
}

#[test]
fn settings_default_without_file() {
    let settings = Settings::load(None).unwrap();
    assert_eq!(settings.pipeline.concurrency, 8);
    assert_eq!(settings.pipeline.api_delay(), Duration::from_secs(1));
    assert_eq!(settings.pool_for("assets").upload_timeout(), Duration::from_secs(60));
    assert_eq!(settings.pool_for("posts").upload_timeout(), Duration::from_secs(300));
    assert_eq!(settings.content_types.article, "articlePage");
    assert!(settings.entries.layout.is_none());
}

#[test]
fn settings_from_toml_overrides_and_keeps_defaults() {
    let settings = Settings::from_toml(
        r#"
        [pipeline]
        concurrency = 4
        api_delay_ms = 250

        [stages.assets]
        concurrency = 2

        [content_types]
        article = "blogPost"

        [entries]
        layout = "layout-1"
        "#,
    )
    .unwrap();

    assert_eq!(settings.pool_for("authors").concurrency, 4);
    assert_eq!(settings.pool_for("assets").concurrency, 2);
    assert_eq!(settings.pool_for("assets").api_delay(), Duration::from_millis(250));
    // The built-in posts override survives a file that does not mention it.
    assert_eq!(settings.pool_for("posts").upload_timeout_secs, 300);
    assert_eq!(settings.content_types.article, "blogPost");
    assert_eq!(settings.content_types.author, "author");
    assert_eq!(settings.entries.layout.as_deref(), Some("layout-1"));
}

#[test]
fn settings_partial_stage_override_keeps_builtin_keys() {
    let settings = Settings::from_toml(
        r#"
        [stages.posts]
        concurrency = 2
        "#,
    )
    .unwrap();

    let posts = settings.pool_for("posts");
    assert_eq!(posts.concurrency, 2);
    assert_eq!(posts.upload_timeout(), Duration::from_secs(300));
    assert_eq!(posts.api_delay(), Duration::from_secs(1));
}

#[test]
fn settings_rejects_malformed_toml() {
    assert!(Settings::from_toml("[pipeline\nconcurrency = ").is_err());
}

#[test]
fn settings_load_reports_missing_file() {
    let path = std::env::temp_dir().join(format!("wpcf-missing-{}.toml", uuid::Uuid::new_v4()));
    let err = Settings::load(Some(&path)).unwrap_err();
    assert!(err.to_string().contains("cannot read settings"));
}
