//! Canonical PostgreSQL-dialect statements executed on the embedded backend.
//!
//! Each test writes the statement the way it would run on PostgreSQL and
//! checks that the translated form behaves the same on SQLite.

use dual_pool::sql::translate;
use dual_pool::{Pool, QueryParam, StoreConfig, params};
use serde_json::{Value, json};

async fn open_pool() -> (tempfile::TempDir, Pool) {
    let dir = tempfile::tempdir().unwrap();
    let pool = Pool::open(&StoreConfig::embedded(dir.path().join("translate.sqlite")))
        .await
        .unwrap();
    pool.query(
        "CREATE TABLE IF NOT EXISTS chats (
            id SERIAL PRIMARY KEY,
            jid TEXT NOT NULL UNIQUE,
            name TEXT,
            settings JSONB DEFAULT '{}'::jsonb,
            welcome INTEGER DEFAULT 0,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP DEFAULT NOW()
        )",
        &[],
    )
    .await
    .unwrap();
    (dir, pool)
}

fn rows_json(result: &dual_pool::QueryResult) -> Value {
    Value::Array(result.rows.iter().cloned().map(Value::Object).collect())
}

#[tokio::test]
async fn test_default_timestamps_are_filled() {
    let (_dir, pool) = open_pool().await;
    pool.query("INSERT INTO chats (jid) VALUES ($1)", &["g1".into()])
        .await
        .unwrap();

    let result = pool
        .query(
            "SELECT CASE WHEN created_at IS NOT NULL THEN 'yes' ELSE 'no' END AS has_created, \
             CASE WHEN updated_at >= NOW() - INTERVAL '1 minute' THEN 'yes' ELSE 'no' END AS recent \
             FROM chats WHERE jid = $1",
            &["g1".into()],
        )
        .await
        .unwrap();
    assert_eq!(rows_json(&result), json!([{"has_created": "yes", "recent": "yes"}]));
    pool.end().await;
}

#[tokio::test]
async fn test_upsert_with_conflict_target() {
    let (_dir, pool) = open_pool().await;
    let upsert = "INSERT INTO chats (jid, name) VALUES ($1, $2) \
                  ON CONFLICT (jid) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()";

    pool.query(upsert, &params!["g1", "first"]).await.unwrap();
    pool.query(upsert, &params!["g1", "second"]).await.unwrap();

    let result = pool
        .query("SELECT COUNT(*) AS n, MAX(name) AS name FROM chats", &[])
        .await
        .unwrap();
    assert_eq!(rows_json(&result), json!([{"n": 1, "name": "second"}]));
    pool.end().await;
}

#[tokio::test]
async fn test_json_constructors_and_casts() {
    let (_dir, pool) = open_pool().await;
    pool.query(
        "INSERT INTO chats (jid, name, settings) VALUES ($1, $2, $3::jsonb)",
        &params!["g1", "alpha", json!({"antilink": true})],
    )
    .await
    .unwrap();

    let result = pool
        .query(
            "SELECT jsonb_build_object('jid', jid, 'name', name::text) AS summary, \
             jsonb_typeof(settings) AS kind \
             FROM chats WHERE name ILIKE $1",
            &["ALPHA".into()],
        )
        .await
        .unwrap();
    let row = result.first().unwrap();
    let summary: Value = serde_json::from_str(row["summary"].as_str().unwrap()).unwrap();
    assert_eq!(summary, json!({"jid": "g1", "name": "alpha"}));
    assert_eq!(row["kind"], "object");
    pool.end().await;
}

#[tokio::test]
async fn test_returning_row_is_normalized() {
    let (_dir, pool) = open_pool().await;
    let result = pool
        .query(
            "INSERT INTO chats (jid, welcome) VALUES ($1, $2) RETURNING id, jid, welcome",
            &params!["g1", true],
        )
        .await
        .unwrap();
    assert_eq!(
        rows_json(&result),
        json!([{"id": 1, "jid": "g1", "welcome": true}])
    );
    pool.end().await;
}

#[tokio::test]
async fn test_interval_cleanup_query() {
    let (_dir, pool) = open_pool().await;
    pool.query(
        "INSERT INTO chats (jid, updated_at) VALUES ($1, datetime('now', '-10 days')), ($2, NOW())",
        &params!["old", "fresh"],
    )
    .await
    .unwrap();

    let deleted = pool
        .query(
            "DELETE FROM chats WHERE updated_at < NOW() - INTERVAL '7 days'",
            &[],
        )
        .await
        .unwrap();
    assert_eq!(deleted.row_count, 1);

    let remaining = pool.query("SELECT jid FROM chats", &[]).await.unwrap();
    assert_eq!(rows_json(&remaining), json!([{"jid": "fresh"}]));
    pool.end().await;
}

#[tokio::test]
async fn test_literals_pass_through_untouched() {
    let (_dir, pool) = open_pool().await;
    pool.query(
        "INSERT INTO chats (jid, name) VALUES ($1, 'costs $1 ::text NOW()')",
        &["g1".into()],
    )
    .await
    .unwrap();

    let result = pool.query("SELECT name FROM chats", &[]).await.unwrap();
    assert_eq!(
        rows_json(&result),
        json!([{"name": "costs $1 ::text NOW()"}])
    );
    pool.end().await;
}

#[test]
fn test_translation_is_deterministic() {
    let sql = "SELECT * FROM t WHERE a = $2 AND b = $1 AND c = $2";
    let params = params![1, "x"];
    let first = translate(sql, &params);
    assert_eq!(first, translate(sql, &params));
    assert_eq!(first.sql, "SELECT * FROM t WHERE a = ? AND b = ? AND c = ?");
    assert_eq!(
        first.params,
        vec![
            QueryParam::String("x".to_string()),
            QueryParam::Int(1),
            QueryParam::String("x".to_string()),
        ]
    );
}
