//! Integration tests for the tokio-postgres backend.
//!
//! These tests require a running PostgreSQL server. Set the
//! TEST_POSTGRES_URL environment variable to run them, and enable the
//! backend: cargo test --features backend-tokio

#![cfg(feature = "backend-tokio")]

use pg_adapter::{Database, NativePostgres, SqlParam, Transaction as _, TxOptions};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

macro_rules! require_db {
    () => {
        match std::env::var("TEST_POSTGRES_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("Skipping test: TEST_POSTGRES_URL not set");
                return;
            }
        }
    };
}

async fn fresh_table(db: &NativePostgres, name: &str, ddl: &str) {
    db.execute(&format!("DROP TABLE IF EXISTS {name}"), &[])
        .await
        .unwrap();
    db.execute(&format!("CREATE TABLE {name} ({ddl})"), &[])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_ping_and_close() {
    init_logging();
    let url = require_db!();

    let db = NativePostgres::connect(&url).await.unwrap();
    db.ping().await.unwrap();

    let status = db.pool_status();
    assert!(status.size >= 1);
    assert!(status.all_idle(), "got {status:?}");

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_invalid_dsn_fails() {
    init_logging();

    let result = NativePostgres::connect("this is not a dsn").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_execute_and_query_round_trip() {
    init_logging();
    let url = require_db!();

    let db = NativePostgres::connect(&url).await.unwrap();
    fresh_table(&db, "native_exec_test", "id BIGINT PRIMARY KEY, name TEXT").await;

    let result = db
        .execute(
            "INSERT INTO native_exec_test(id, name) VALUES($1, $2)",
            &[SqlParam::Int(1), SqlParam::from("one")],
        )
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 1);

    let rows = db
        .query("SELECT id, name FROM native_exec_test", &[])
        .await
        .unwrap();
    assert_eq!(rows.columns(), ["id".to_string(), "name".to_string()]);
    assert_eq!(rows.rows()[0]["id"], serde_json::json!(1));
    assert_eq!(rows.rows()[0]["name"], serde_json::json!("one"));

    db.execute("DROP TABLE native_exec_test", &[]).await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_query_empty_result_keeps_columns() {
    init_logging();
    let url = require_db!();

    let db = NativePostgres::connect(&url).await.unwrap();
    fresh_table(&db, "native_empty_test", "a BIGINT, b TEXT").await;

    let rows = db
        .query("SELECT a, b FROM native_empty_test", &[])
        .await
        .unwrap();
    assert_eq!(rows.columns(), ["a".to_string(), "b".to_string()]);
    assert!(rows.is_empty());

    db.execute("DROP TABLE native_empty_test", &[]).await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_query_row_reports_no_rows_sentinel() {
    init_logging();
    let url = require_db!();

    let db = NativePostgres::connect(&url).await.unwrap();
    fresh_table(&db, "native_norows_test", "id BIGINT").await;

    let err = db
        .query_row("SELECT id FROM native_norows_test", &[])
        .await
        .unwrap_err();
    assert!(err.is_no_rows());

    db.execute("DROP TABLE native_norows_test", &[]).await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_transaction_rollback_leaves_table_unchanged() {
    init_logging();
    let url = require_db!();

    let db = NativePostgres::connect(&url).await.unwrap();
    fresh_table(&db, "native_tx_test", "id BIGINT PRIMARY KEY").await;

    let mut tx = db
        .begin(TxOptions::new().isolation("serializable"))
        .await
        .unwrap();
    tx.execute(
        "INSERT INTO native_tx_test(id) VALUES($1)",
        &[SqlParam::Int(42)],
    )
    .await
    .unwrap();
    tx.rollback().await.unwrap();

    let row = db
        .query_row("SELECT count(*) AS n FROM native_tx_test", &[])
        .await
        .unwrap();
    assert_eq!(row["n"], serde_json::json!(0));

    db.execute("DROP TABLE native_tx_test", &[]).await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_abandoned_transaction_rolls_back_on_drop() {
    init_logging();
    let url = require_db!();

    // One connection in the pool, so the next operation reuses the very
    // connection the abandoned transaction ran on.
    let settings = pg_adapter::PoolSettings {
        max_connections: Some(1),
        ..Default::default()
    };
    let db = NativePostgres::connect_with(&url, &settings).await.unwrap();
    fresh_table(&db, "native_drop_test", "id BIGINT PRIMARY KEY").await;

    {
        let mut tx = db.begin(TxOptions::new()).await.unwrap();
        tx.execute("INSERT INTO native_drop_test(id) VALUES(7)", &[])
            .await
            .unwrap();
        // Dropped without commit or rollback.
    }

    // Were the transaction still open on that connection, re-inserting the
    // same key would conflict with its own uncommitted row. The rollback
    // task holds the connection until it finishes, so this waits for it.
    let result = db
        .execute("INSERT INTO native_drop_test(id) VALUES(7)", &[])
        .await
        .unwrap();
    assert_eq!(result.rows_affected(), 1);

    let row = db
        .query_row("SELECT count(*) AS n FROM native_drop_test", &[])
        .await
        .unwrap();
    assert_eq!(row["n"], serde_json::json!(1));

    db.execute("DROP TABLE native_drop_test", &[]).await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_unique_violation_exposes_sql_state() {
    init_logging();
    let url = require_db!();

    let db = NativePostgres::connect(&url).await.unwrap();
    fresh_table(&db, "native_conflict_test", "id BIGINT PRIMARY KEY").await;

    db.execute(
        "INSERT INTO native_conflict_test(id) VALUES($1)",
        &[SqlParam::Int(1)],
    )
    .await
    .unwrap();

    let err = db
        .execute(
            "INSERT INTO native_conflict_test(id) VALUES($1)",
            &[SqlParam::Int(1)],
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "23505");

    db.execute("DROP TABLE native_conflict_test", &[]).await.unwrap();
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_server_version_reports_postgres() {
    init_logging();
    let url = require_db!();

    let db = NativePostgres::connect(&url).await.unwrap();
    let version = db.server_version().await;
    assert!(version.unwrap().contains("PostgreSQL"));
    db.close().await.unwrap();
}
