//! Integration tests for the fan-send binary

use assert_cmd::Command;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use libfanpost::credentials::{Credentials, DiscordConfig};
use libfanpost::{Database, Platform, Post, PostStatus};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

/// Setup test environment with config and database
async fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("test.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[dispatch]
lookback = "5m"
call_timeout = "5s"
max_attempts = 3
"#,
        db_path.display().to_string().replace('\\', "/")
    );
    fs::write(&config_path, config_content).unwrap();

    // Initialize database
    let _db = Database::new(db_path.to_str().unwrap()).await.unwrap();

    (
        temp_dir,
        config_path.to_str().unwrap().to_string(),
        db_path.to_str().unwrap().to_string(),
    )
}

/// Create a scheduled Discord post that is due now
async fn create_due_post(db_path: &str, user_id: &str) -> String {
    let db = Database::new(db_path).await.unwrap();
    let now = chrono::Utc::now().timestamp();

    let post = Post::new(user_id, "Test scheduled post", vec![Platform::Discord])
        .scheduled_for(now - 10);
    let post_id = post.id.clone();
    db.create_post(&post).await.unwrap();
    post_id
}

fn run_once(config_path: &str) -> Value {
    let output = Command::cargo_bin("fan-send")
        .unwrap()
        .arg("--config")
        .arg(config_path)
        .arg("--once")
        .env_remove("FANPOST_LOG_FORMAT")
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "fan-send failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is a JSON tick report")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_once_with_nothing_due() {
    let (_temp_dir, config_path, _db_path) = setup_test_env().await;

    let report = run_once(&config_path);
    assert_eq!(report["success"], true);
    assert_eq!(report["processed"], 0);
    assert_eq!(report["results"], serde_json::json!([]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_once_reports_missing_credentials() {
    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let post_id = create_due_post(&db_path, "nobody").await;

    let report = run_once(&config_path);
    assert_eq!(report["processed"], 1);
    assert_eq!(report["results"][0]["postId"], post_id.as_str());
    assert_eq!(report["results"][0]["status"], "error");
    assert!(report["results"][0]["error"]
        .as_str()
        .unwrap()
        .contains("No credentials configured"));

    let db = Database::new(&db_path).await.unwrap();
    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Scheduled);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_once_publishes_through_webhook() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/hook", post(|| async { StatusCode::NO_CONTENT }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (_temp_dir, config_path, db_path) = setup_test_env().await;
    let db = Database::new(&db_path).await.unwrap();
    let mut credentials = Credentials::new("user-1");
    credentials.discord = Some(DiscordConfig {
        webhook_url: Some(format!("http://{}/hook", addr)),
        ..Default::default()
    });
    db.upsert_credentials(&credentials).await.unwrap();
    let post_id = create_due_post(&db_path, "user-1").await;

    // The binary blocks this thread; the stub keeps serving on the other workers
    let report = tokio::task::spawn_blocking(move || run_once(&config_path))
        .await
        .unwrap();
    assert_eq!(report["results"][0]["status"], "published");

    let post = db.get_post(&post_id).await.unwrap().unwrap();
    assert_eq!(post.status, PostStatus::Published);
    assert_eq!(post.published_platforms, vec![Platform::Discord]);
}

#[test]
fn test_invalid_config_exits_with_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[dispatch]\nlookback = \"whenever\"\n").unwrap();

    Command::cargo_bin("fan-send")
        .unwrap()
        .arg("--config")
        .arg(&config_path)
        .arg("--once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("dispatch.lookback"));
}

#[test]
fn test_help_describes_once() {
    Command::cargo_bin("fan-send")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--once"))
        .stdout(predicate::str::contains("--poll-interval"));
}
