//! Embedded SQLite backend.
//!
//! The pool holds exactly one connection, so statements are serialized by the
//! pool's acquire queue. Every statement is translated from PostgreSQL dialect
//! before it reaches SQLite.

use crate::config::PoolOptions;
use crate::db::params::{bind_sqlite_param, coerce_for_sqlite};
use crate::db::transaction::Transaction;
use crate::db::types::{BoolColumns, RowToJson};
use crate::error::{DbError, DbResult};
use crate::models::{BackendStats, QueryParam, QueryResult, Row};
use crate::sql::{StatementKind, insert_table, is_upsert, translate};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteQueryResult, SqliteRow,
};
use sqlx::{SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct EmbeddedStore {
    pool: SqlitePool,
    path: PathBuf,
    bool_columns: Arc<BoolColumns>,
    acquire_timeout_secs: u64,
}

impl EmbeddedStore {
    /// Open (creating if missing) the SQLite file at `path` in WAL mode.
    pub async fn open(
        path: &Path,
        options: &PoolOptions,
        bool_columns: BoolColumns,
    ) -> DbResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DbError::connection(
                    format!("Failed to create directory {}: {}", parent.display(), e),
                    "Check that the SQLite path is writable",
                )
            })?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(0)
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(options.acquire_timeout_or_default()))
            // The single connection is kept for the lifetime of the pool
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to open {}: {}", path.display(), e),
                    "Check the SQLite path and file permissions",
                )
            })?;

        info!(path = %path.display(), "Opened embedded SQLite database");

        Ok(Self {
            pool,
            path: path.to_path_buf(),
            bool_columns: Arc::new(bool_columns),
            acquire_timeout_secs: options.acquire_timeout_or_default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DbError::from_acquire(e, self.acquire_timeout_secs))?;
        run(&mut conn, sql, params, &self.bool_columns).await
    }

    pub async fn begin(&self) -> DbResult<Transaction> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::from_acquire(e, self.acquire_timeout_secs))?;
        Ok(Transaction::embedded(tx, Arc::clone(&self.bool_columns)))
    }

    pub async fn stats(&self) -> BackendStats {
        let page_count = self.pragma_i64("PRAGMA page_count").await;
        let page_size = self.pragma_i64("PRAGMA page_size").await;
        let journal_mode = sqlx::query_scalar::<_, String>("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await
            .ok();
        let size = page_count.zip(page_size).map(|(count, size)| {
            humansize::format_size((count * size).max(0) as u64, humansize::DECIMAL)
        });

        BackendStats::Embedded {
            path: self.path.display().to_string(),
            journal_mode,
            page_count,
            page_size,
            size,
        }
    }

    async fn pragma_i64(&self, pragma: &str) -> Option<i64> {
        sqlx::query_scalar::<_, i64>(pragma)
            .fetch_one(&self.pool)
            .await
            .ok()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Translate and run one statement on an embedded connection.
pub(crate) async fn run(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[QueryParam],
    bool_columns: &BoolColumns,
) -> DbResult<QueryResult> {
    let translated = translate(sql, params);
    let params: Vec<QueryParam> = translated
        .params
        .into_iter()
        .map(coerce_for_sqlite)
        .collect();
    let kind = StatementKind::classify(&translated.sql);

    debug!(
        sql = %translated.sql,
        params = params.len(),
        kind = ?kind,
        "Executing embedded statement"
    );

    match kind {
        StatementKind::Select => {
            let rows = fetch_rows(conn, &translated.sql, &params).await?;
            Ok(QueryResult::from_rows(normalize_rows(rows, bool_columns)))
        }
        StatementKind::Insert | StatementKind::Update | StatementKind::Delete => {
            let wants_row = kind == StatementKind::Insert && translated.returning.is_some();
            // An upsert that updates in place leaves last_insert_rowid() untouched
            let rowid_before = if wants_row && is_upsert(&translated.sql) {
                Some(last_insert_rowid(conn).await?)
            } else {
                None
            };

            let result = execute(conn, &translated.sql, &params).await?;
            let affected = result.rows_affected();
            let rowid = result.last_insert_rowid();

            let returned = match translated.returning.as_deref() {
                Some(_) if rowid_before == Some(rowid) => {
                    debug!("Upsert updated an existing row; nothing to read back for RETURNING");
                    None
                }
                Some(columns) if wants_row && affected > 0 => {
                    reselect_inserted(conn, &translated.sql, columns, rowid).await?
                }
                _ => None,
            };

            Ok(match returned {
                Some(rows) => QueryResult {
                    rows: normalize_rows(rows, bool_columns),
                    row_count: affected,
                },
                None => QueryResult::affected(affected),
            })
        }
        StatementKind::Other => {
            let result = execute(conn, &translated.sql, &params).await?;
            Ok(QueryResult::affected(result.rows_affected()))
        }
    }
}

/// Emulate `INSERT .. RETURNING` by reading the row back through its rowid.
async fn reselect_inserted(
    conn: &mut SqliteConnection,
    sql: &str,
    columns: &str,
    rowid: i64,
) -> DbResult<Option<Vec<SqliteRow>>> {
    let Some(table) = insert_table(sql) else {
        debug!("RETURNING requested but the insert target could not be determined");
        return Ok(None);
    };
    let select = format!("SELECT {} FROM {} WHERE rowid = ?", columns, table);
    fetch_rows(conn, &select, &[QueryParam::Int(rowid)])
        .await
        .map(Some)
}

async fn last_insert_rowid(conn: &mut SqliteConnection) -> DbResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT last_insert_rowid()")
        .fetch_one(&mut *conn)
        .await
        .map_err(DbError::from)
}

fn normalize_rows(rows: Vec<SqliteRow>, bool_columns: &BoolColumns) -> Vec<Row> {
    rows.iter()
        .map(|r| {
            let mut row = r.to_json_map();
            bool_columns.normalize(&mut row);
            row
        })
        .collect()
}

async fn fetch_rows(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<Vec<SqliteRow>> {
    // When params is empty, use raw SQL
    let rows = if params.is_empty() {
        sqlx::Executor::fetch_all(&mut *conn, sql).await
    } else {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        query.fetch_all(&mut *conn).await
    };
    rows.map_err(DbError::from)
}

async fn execute(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<SqliteQueryResult> {
    // Unparameterized text may hold several statements
    let result = if params.is_empty() {
        sqlx::Executor::execute(&mut *conn, sql).await
    } else {
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        query.execute(&mut *conn).await
    };
    result.map_err(DbError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn open_temp() -> (tempfile::TempDir, EmbeddedStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(
            &dir.path().join("nested/dir/test.sqlite"),
            &PoolOptions::default(),
            BoolColumns::default(),
        )
        .await
        .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_open_creates_parent_directories() {
        let (dir, store) = open_temp().await;
        assert!(dir.path().join("nested/dir").is_dir());
        assert!(store.path().ends_with("test.sqlite"));
        store.close().await;
    }

    #[tokio::test]
    async fn test_wal_journal_mode() {
        let (_dir, store) = open_temp().await;
        let result = store.query("PRAGMA journal_mode", &[]).await.unwrap();
        assert_eq!(result.rows[0]["journal_mode"], json!("wal"));
        store.close().await;
    }

    #[tokio::test]
    async fn test_insert_returning_is_emulated() {
        let (_dir, store) = open_temp().await;
        store
            .query(
                "CREATE TABLE chats (id SERIAL PRIMARY KEY, name TEXT, is_muted INTEGER)",
                &[],
            )
            .await
            .unwrap();

        let result = store
            .query(
                "INSERT INTO chats (name, is_muted) VALUES ($1, $2) RETURNING id, name, is_muted",
                &["chat".into(), true.into()],
            )
            .await
            .unwrap();

        assert_eq!(result.row_count, 1);
        assert_eq!(
            serde_json::Value::Object(result.rows[0].clone()),
            json!({"id": 1, "name": "chat", "is_muted": true})
        );
        store.close().await;
    }

    #[tokio::test]
    async fn test_returning_ignores_trailing_comment() {
        let (_dir, store) = open_temp().await;
        store
            .query("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
            .await
            .unwrap();

        let result = store
            .query(
                "INSERT INTO t (v) VALUES ($1) RETURNING id -- new row",
                &["a".into()],
            )
            .await
            .unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(
            serde_json::Value::Object(result.rows[0].clone()),
            json!({"id": 1})
        );

        let result = store
            .query("INSERT INTO t (v) VALUES ($1) RETURNING /* key */ id, v", &["b".into()])
            .await
            .unwrap();
        assert_eq!(
            serde_json::Value::Object(result.rows[0].clone()),
            json!({"id": 2, "v": "b"})
        );
        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_update_does_not_return_stale_row() {
        let (_dir, store) = open_temp().await;
        store
            .query(
                "CREATE TABLE a (id INTEGER PRIMARY KEY, k TEXT UNIQUE, n INTEGER)",
                &[],
            )
            .await
            .unwrap();
        store
            .query("INSERT INTO a (k, n) VALUES ('second', 1)", &[])
            .await
            .unwrap();
        store
            .query("INSERT INTO a (k, n) VALUES ('first', 1)", &[])
            .await
            .unwrap();

        let upsert = "INSERT INTO a (k, n) VALUES ($1, 1) \
                      ON CONFLICT (k) DO UPDATE SET n = a.n + 1 RETURNING id, k, n";
        let updated = store.query(upsert, &["second".into()]).await.unwrap();
        assert_eq!(updated.row_count, 1);
        assert!(updated.rows.is_empty());

        let stored = store
            .query("SELECT n FROM a WHERE k = $1", &["second".into()])
            .await
            .unwrap();
        assert_eq!(stored.rows[0]["n"], 2);

        let inserted = store.query(upsert, &["third".into()]).await.unwrap();
        assert_eq!(
            serde_json::Value::Object(inserted.rows[0].clone()),
            json!({"id": 3, "k": "third", "n": 1})
        );
        store.close().await;
    }

    #[tokio::test]
    async fn test_insert_without_rows_skips_returning() {
        let (_dir, store) = open_temp().await;
        store
            .query("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
            .await
            .unwrap();
        store
            .query("INSERT INTO t (id, v) VALUES (1, 'a')", &[])
            .await
            .unwrap();

        let result = store
            .query(
                "INSERT OR IGNORE INTO t (id, v) VALUES ($1, $2) RETURNING id",
                &[1.into(), "b".into()],
            )
            .await
            .unwrap();
        assert_eq!(result.row_count, 0);
        assert!(result.rows.is_empty());
        store.close().await;
    }

    #[tokio::test]
    async fn test_update_reports_affected_rows() {
        let (_dir, store) = open_temp().await;
        store
            .query(
                "CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT); \
                 INSERT INTO t (v) VALUES ('a'); INSERT INTO t (v) VALUES ('b');",
                &[],
            )
            .await
            .unwrap();

        let result = store
            .query("UPDATE t SET v = $1", &["z".into()])
            .await
            .unwrap();
        assert_eq!(result.row_count, 2);
        assert!(result.rows.is_empty());
        store.close().await;
    }

    #[tokio::test]
    async fn test_statement_error_keeps_message() {
        let (_dir, store) = open_temp().await;
        let err = store.query("SELECT * FROM missing", &[]).await.unwrap_err();
        assert!(err.to_string().contains("no such table"));
        store.close().await;
    }

    #[tokio::test]
    async fn test_stats_reports_file_details() {
        let (_dir, store) = open_temp().await;
        match store.stats().await {
            BackendStats::Embedded {
                journal_mode,
                page_size,
                size,
                ..
            } => {
                assert_eq!(journal_mode.as_deref(), Some("wal"));
                assert!(page_size.unwrap_or_default() > 0);
                assert!(size.is_some());
            }
            other => panic!("unexpected stats: {:?}", other),
        }
        store.close().await;
    }
}
