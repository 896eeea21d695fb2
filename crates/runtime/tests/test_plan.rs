use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use courier_config::AppConfig;
use courier_database::{Contact, Direction, Message, MessageRecord, MessageStatus};
use courier_runtime::{self, BackendServices};
use sqlx::Row;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

fn record(conversation_id: &str, message_id: &str) -> MessageRecord {
    MessageRecord::new(
        Contact {
            name: "Ada".to_string(),
            number: conversation_id.to_string(),
        },
        Message {
            conversation_id: conversation_id.to_string(),
            message_id: message_id.to_string(),
            direction: Direction::Incoming,
            content: "hello".to_string(),
            timestamp: Utc::now(),
            status: MessageStatus::Pending,
        },
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let table: String = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'messages'",
    )
    .fetch_one(&services.db_pool)
    .await?;

    assert_eq!("messages", table);
    assert!(services.engine.history().await.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_restores_history_after_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/restart.db");
    let config = build_config(sqlite_url(&db_path), 2);

    let services = initialise(&config).await?;
    services.engine.receive(record("+15550001", "m1")).await?;
    services.engine.receive(record("+15550001", "m2")).await?;
    services.db_pool.close().await;
    drop(services);

    let restarted = initialise(&config).await?;
    let history = restarted.engine.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].messages.len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_wires_engine_to_shared_hub() -> Result<()> {
    let config = build_config("sqlite::memory:".into(), 1);
    let services = initialise(&config).await?;

    let mut subscription = services.hub.subscribe().await;
    services.engine.receive(record("a", "m1")).await?;

    let event = subscription.recv().await.context("expected an event")?;
    assert_eq!(event.event_name(), "new_message");
    assert_eq!(services.engine.hub().subscriber_count().await, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_creates_sqlite_directory_if_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let db_path = db_dir.join("prepared.db");
    let config = build_config(sqlite_url(&db_path), 2);

    assert!(!db_dir.exists());

    let services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");
    assert!(db_path.exists(), "sqlite database file should be created");
    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_applies_max_connections_setting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/max_conn.db");
    let max_connections = 3;
    let config = build_config(sqlite_url(&db_path), max_connections);

    let services = initialise(&config).await?;
    assert_eq!(
        max_connections,
        services.db_pool.options().get_max_connections()
    );

    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_sqlite_path_noops_for_memory_database() -> Result<()> {
    let config = build_config("sqlite::memory:".into(), 1);
    let services = initialise(&config).await?;

    let databases = sqlx::query("PRAGMA database_list")
        .fetch_all(&services.db_pool)
        .await?;
    let main_db = databases
        .into_iter()
        .find(|row| {
            row.try_get::<String, _>("name")
                .map(|name| name == "main")
                .unwrap_or(false)
        })
        .context("expected main in PRAGMA database_list")?;
    let file: String = main_db.try_get("file")?;
    assert!(
        file.is_empty(),
        "in-memory sqlite database should not create filesystem entries"
    );

    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn ensure_sqlite_path_ignores_non_sqlite_urls() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let target_dir = temp_dir.path().join("should_not_exist");
    let malformed_url = format!("postgres://{}/ignored.db", target_dir.to_string_lossy());
    let config = build_config(malformed_url, 1);

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected sqlite connection to fail for non-sqlite URL"),
        Err(error) => error,
    };
    assert!(
        !target_dir.exists(),
        "non-sqlite URLs must not create filesystem structures"
    );
    assert!(
        format!("{error:#}").contains("failed to connect to database"),
        "expected database connection failure for non-sqlite URL"
    );

    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    courier_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = courier_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { courier_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
