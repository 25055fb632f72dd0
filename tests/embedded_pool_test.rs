//! Integration tests for the embedded SQLite backend through `Pool`.

use dual_pool::models::BackendStats;
use dual_pool::{Pool, QueryParam, StoreConfig, StoreMode, params};
use serde::Deserialize;
use serde_json::{Value, json};

async fn open_pool() -> (tempfile::TempDir, Pool) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::embedded(dir.path().join("data/database.sqlite"))
        .with_bool_columns(["gamemode"]);
    let pool = Pool::open(&config).await.unwrap();
    (dir, pool)
}

fn rows_json(result: &dual_pool::QueryResult) -> Value {
    Value::Array(result.rows.iter().cloned().map(Value::Object).collect())
}

#[tokio::test]
async fn test_boolean_round_trip() {
    let (_dir, pool) = open_pool().await;
    assert_eq!(pool.mode(), StoreMode::Embedded);

    pool.query(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, active INTEGER)",
        &[],
    )
    .await
    .unwrap();
    let insert = pool
        .query("INSERT INTO users (active) VALUES ($1)", &[true.into()])
        .await
        .unwrap();
    assert_eq!(insert.row_count, 1);

    let stored = pool
        .query("SELECT typeof(active) AS t, active + 0 AS raw FROM users", &[])
        .await
        .unwrap();
    assert_eq!(rows_json(&stored), json!([{"t": "integer", "raw": 1}]));

    let result = pool.query("SELECT * FROM users", &[]).await.unwrap();
    assert_eq!(rows_json(&result), json!([{"id": 1, "active": true}]));
    assert_eq!(result.row_count, 1);

    pool.end().await;
}

#[tokio::test]
async fn test_configured_bool_columns() {
    let (_dir, pool) = open_pool().await;
    pool.query(
        "CREATE TABLE players (id INTEGER PRIMARY KEY, gamemode INTEGER, score INTEGER)",
        &[],
    )
    .await
    .unwrap();
    pool.query(
        "INSERT INTO players (gamemode, score) VALUES ($1, $2)",
        &params![false, 1],
    )
    .await
    .unwrap();

    let result = pool
        .query("SELECT gamemode, score FROM players", &[])
        .await
        .unwrap();
    assert_eq!(rows_json(&result), json!([{"gamemode": false, "score": 1}]));
    pool.end().await;
}

#[tokio::test]
async fn test_repeated_placeholders() {
    let (_dir, pool) = open_pool().await;
    let result = pool
        .query("SELECT $1 AS a, $1 AS b, $2 AS c", &params![10, 20])
        .await
        .unwrap();
    assert_eq!(rows_json(&result), json!([{"a": 10, "b": 10, "c": 20}]));
    pool.end().await;
}

#[tokio::test]
async fn test_json_parameters_stored_as_text() {
    let (_dir, pool) = open_pool().await;
    pool.query(
        "CREATE TABLE settings (id SERIAL PRIMARY KEY, data JSONB NOT NULL DEFAULT '{}'::jsonb)",
        &[],
    )
    .await
    .unwrap();

    let inserted = pool
        .query(
            "INSERT INTO settings (data) VALUES ($1) RETURNING id, data",
            &[json!({"lang": "en", "tags": [1, 2]}).into()],
        )
        .await
        .unwrap();
    assert_eq!(inserted.row_count, 1);
    let row = inserted.first().unwrap();
    assert_eq!(row["id"], 1);
    let data: Value = serde_json::from_str(row["data"].as_str().unwrap()).unwrap();
    assert_eq!(data, json!({"lang": "en", "tags": [1, 2]}));

    let lang = pool
        .query(
            "SELECT json_extract(data, '$.lang') AS lang FROM settings WHERE id = $1",
            &[1.into()],
        )
        .await
        .unwrap();
    assert_eq!(rows_json(&lang), json!([{"lang": "en"}]));
    pool.end().await;
}

#[tokio::test]
async fn test_decode_rows_into_structs() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
        is_admin: bool,
    }

    let (_dir, pool) = open_pool().await;
    pool.query(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, is_admin INTEGER NOT NULL)",
        &[],
    )
    .await
    .unwrap();
    pool.query(
        "INSERT INTO users (name, is_admin) VALUES ($1, $2), ($3, $4)",
        &params!["ana", true, "bo", false],
    )
    .await
    .unwrap();

    let users: Vec<User> = pool
        .query("SELECT id, name, is_admin FROM users ORDER BY id", &[])
        .await
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(
        users,
        vec![
            User {
                id: 1,
                name: "ana".to_string(),
                is_admin: true
            },
            User {
                id: 2,
                name: "bo".to_string(),
                is_admin: false
            },
        ]
    );
    pool.end().await;
}

#[tokio::test]
async fn test_session_runs_statements_in_order() {
    let (_dir, pool) = open_pool().await;
    let mut session = pool.connect().await.unwrap();
    assert_eq!(session.mode(), StoreMode::Embedded);
    session
        .query("CREATE TABLE counters (name TEXT PRIMARY KEY, n INTEGER)", &[])
        .await
        .unwrap();
    session
        .query(
            "INSERT INTO counters (name, n) VALUES ($1, 1) \
             ON CONFLICT (name) DO UPDATE SET n = counters.n + 1",
            &["hits".into()],
        )
        .await
        .unwrap();
    session
        .query(
            "INSERT INTO counters (name, n) VALUES ($1, 1) \
             ON CONFLICT (name) DO UPDATE SET n = counters.n + 1",
            &["hits".into()],
        )
        .await
        .unwrap();
    session.release();

    let result = pool
        .query("SELECT n FROM counters WHERE name = $1", &["hits".into()])
        .await
        .unwrap();
    assert_eq!(rows_json(&result), json!([{"n": 2}]));
    pool.end().await;
}

#[tokio::test]
async fn test_statement_error_is_surfaced() {
    let (_dir, pool) = open_pool().await;
    pool.query("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();
    pool.query("INSERT INTO t (id) VALUES (1)", &[]).await.unwrap();

    let err = pool
        .query("INSERT INTO t (id) VALUES ($1)", &[QueryParam::Int(1)])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("UNIQUE"));
    assert!(err.code().is_some());
    assert!(!err.is_breaker_open());

    // The pool keeps working after a failed statement
    assert!(pool.query("SELECT 1", &[]).await.is_ok());
    pool.end().await;
}

#[tokio::test]
async fn test_stats_and_health() {
    let (dir, pool) = open_pool().await;
    pool.query("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
        .await
        .unwrap();

    let stats = pool.stats().await;
    assert_eq!(stats.mode, StoreMode::Embedded);
    assert!(stats.healthy);
    assert!(!stats.closed);
    assert!(stats.circuit_breaker.is_none());
    match &stats.backend {
        BackendStats::Embedded {
            path, journal_mode, ..
        } => {
            assert!(path.starts_with(dir.path().to_str().unwrap()));
            assert_eq!(journal_mode.as_deref(), Some("wal"));
        }
        other => panic!("unexpected backend stats: {:?}", other),
    }

    let health = pool.health_check().await;
    assert!(health.healthy);
    assert!(health.latency_ms.is_some());
    assert!(health.error.is_none());

    let json = serde_json::to_value(&health).unwrap();
    assert_eq!(json["mode"], "embedded");
    pool.end().await;
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::embedded(dir.path().join("persist.sqlite"));

    let pool = Pool::open(&config).await.unwrap();
    pool.query(
        "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT); \
         INSERT INTO notes (body) VALUES ('kept');",
        &[],
    )
    .await
    .unwrap();
    pool.end().await;

    let reopened = Pool::open(&config).await.unwrap();
    let result = reopened.query("SELECT body FROM notes", &[]).await.unwrap();
    assert_eq!(rows_json(&result), json!([{"body": "kept"}]));
    reopened.end().await;
}
