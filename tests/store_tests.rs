//! Job store integration tests
//!
//! Creation uniqueness, compare-and-swap handle installation, atomic stem
//! reference updates, and failure persistence.

use stemsep::db::jobs::{self, NewJob};
use stemsep::models::{JobState, StemRefs, StemRole};

async fn test_pool() -> (sqlx::SqlitePool, tempfile::TempDir) {
    let tmp = tempfile::tempdir().unwrap();
    let pool = stemsep::db::init_database_pool(&tmp.path().join("test.db"))
        .await
        .unwrap();
    (pool, tmp)
}

fn new_job(media_id: &str) -> NewJob {
    NewJob {
        media_id: media_id.to_string(),
        search_term: "summer nights".to_string(),
        thumbnail_ref: format!("/api/downloads/{}/thumbnail.jpg", media_id),
        acquired_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn test_create_and_get_roundtrip() {
    let (pool, _tmp) = test_pool().await;

    jobs::create_job(&pool, &new_job("abc123")).await.unwrap();

    let record = jobs::get_job(&pool, "abc123").await.unwrap().unwrap();
    assert_eq!(record.media_id, "abc123");
    assert_eq!(record.search_term, "summer nights");
    assert_eq!(record.thumbnail_ref, "/api/downloads/abc123/thumbnail.jpg");
    assert!(record.separation_handle.is_none());
    assert!(record.stem_refs.is_none());
    assert!(record.failed_reason.is_none());
    assert_eq!(record.state(), JobState::Acquired);
}

#[tokio::test]
async fn test_get_absent_returns_none() {
    let (pool, _tmp) = test_pool().await;

    let record = jobs::get_job(&pool, "nosuch").await.unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_duplicate_create_rejected() {
    let (pool, _tmp) = test_pool().await;

    jobs::create_job(&pool, &new_job("abc123")).await.unwrap();
    let result = jobs::create_job(&pool, &new_job("abc123")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_handle_installed_at_most_once() {
    let (pool, _tmp) = test_pool().await;
    jobs::create_job(&pool, &new_job("abc123")).await.unwrap();

    let installed = jobs::set_separation_handle(&pool, "abc123", "https://sep.example/get/1")
        .await
        .unwrap();
    assert!(installed);

    // Second writer loses the compare-and-swap
    let installed = jobs::set_separation_handle(&pool, "abc123", "https://sep.example/get/2")
        .await
        .unwrap();
    assert!(!installed);

    let record = jobs::get_job(&pool, "abc123").await.unwrap().unwrap();
    assert_eq!(
        record.separation_handle.as_deref(),
        Some("https://sep.example/get/1")
    );
    assert_eq!(record.state(), JobState::Submitted);
}

#[tokio::test]
async fn test_stem_refs_written_atomically() {
    let (pool, _tmp) = test_pool().await;
    jobs::create_job(&pool, &new_job("abc123")).await.unwrap();
    jobs::set_separation_handle(&pool, "abc123", "https://sep.example/get/1")
        .await
        .unwrap();

    let mut refs = StemRefs::new();
    refs.insert(
        StemRole::Vocals,
        "/api/downloads/abc123/vocals-abc123.mp3".to_string(),
    );
    refs.insert(
        StemRole::Instrumental,
        "/api/downloads/abc123/instrumental-abc123.mp3".to_string(),
    );

    jobs::set_stem_refs(&pool, "abc123", &refs).await.unwrap();

    let record = jobs::get_job(&pool, "abc123").await.unwrap().unwrap();
    let stored = record.stem_refs.clone().unwrap();
    assert_eq!(stored, refs);
    assert_eq!(stored.len(), 2);
    assert_eq!(record.state(), JobState::Completed);
}

#[tokio::test]
async fn test_failed_reason_is_terminal() {
    let (pool, _tmp) = test_pool().await;
    jobs::create_job(&pool, &new_job("abc123")).await.unwrap();
    jobs::set_separation_handle(&pool, "abc123", "https://sep.example/get/1")
        .await
        .unwrap();

    jobs::set_failed_reason(&pool, "abc123", "low volume")
        .await
        .unwrap();

    let record = jobs::get_job(&pool, "abc123").await.unwrap().unwrap();
    assert_eq!(record.failed_reason.as_deref(), Some("low volume"));
    assert_eq!(record.state(), JobState::Failed);
    assert!(record.is_terminal());
}

#[tokio::test]
#[serial_test::serial]
async fn test_api_token_resolution_tiers() {
    let (pool, _tmp) = test_pool().await;
    std::env::remove_var("STEMSEP_API_TOKEN");

    // No token anywhere is a configuration error
    let result =
        stemsep::config::resolve_separation_api_token(&pool, &stemsep::config::TomlConfig::default())
            .await;
    assert!(result.is_err());

    // TOML tier applies when the database has nothing
    let toml = stemsep::config::TomlConfig {
        separation_api_token: Some("toml-token".to_string()),
        ..Default::default()
    };
    let token = stemsep::config::resolve_separation_api_token(&pool, &toml)
        .await
        .unwrap();
    assert_eq!(token, "toml-token");

    // Database is authoritative over TOML
    stemsep::db::settings::set_separation_api_token(&pool, "db-token".to_string())
        .await
        .unwrap();
    let token = stemsep::config::resolve_separation_api_token(&pool, &toml)
        .await
        .unwrap();
    assert_eq!(token, "db-token");
}

#[tokio::test]
async fn test_records_independent_across_ids() {
    let (pool, _tmp) = test_pool().await;
    jobs::create_job(&pool, &new_job("abc123")).await.unwrap();
    jobs::create_job(&pool, &new_job("def456")).await.unwrap();

    jobs::set_separation_handle(&pool, "abc123", "https://sep.example/get/1")
        .await
        .unwrap();

    let other = jobs::get_job(&pool, "def456").await.unwrap().unwrap();
    assert!(other.separation_handle.is_none());
    assert_eq!(other.state(), JobState::Acquired);
}
