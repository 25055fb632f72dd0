//! Unified pool facade.
//!
//! [`Pool`] picks its backend once, at open time: networked PostgreSQL when a
//! database URL is configured, the embedded SQLite file otherwise. Callers use
//! the same operations regardless of the backend.

use crate::config::StoreConfig;
use crate::db::breaker::{BreakerState, CircuitBreaker};
use crate::db::embedded::EmbeddedStore;
use crate::db::macros::impl_backend_dispatch;
use crate::db::networked::NetworkedStore;
use crate::db::session::Session;
use crate::db::transaction::Transaction;
use crate::db::types::BoolColumns;
use crate::error::{DbError, DbResult};
use crate::models::{BackendStats, HealthStatus, PoolStats, QueryParam, QueryResult, StoreMode};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Backend-specific store (avoids AnyPool limitations).
#[derive(Debug, Clone)]
pub(crate) enum Backend {
    Networked(NetworkedStore),
    Embedded(EmbeddedStore),
}

#[derive(Debug, Clone)]
pub struct Pool {
    backend: Backend,
}

impl Pool {
    /// Open the pool selected by `config`.
    ///
    /// The networked pool connects lazily; the embedded file is opened eagerly.
    pub async fn open(config: &StoreConfig) -> DbResult<Self> {
        config.validate()?;

        let backend = match config.networked_url() {
            Some(url) => {
                let breaker = Arc::new(CircuitBreaker::new(config.breaker));
                Backend::Networked(NetworkedStore::connect_lazy(
                    url,
                    &config.pool_options,
                    breaker,
                    config.retry_delay,
                    config.slow_query_threshold,
                )?)
            }
            None => Backend::Embedded(
                EmbeddedStore::open(
                    &config.sqlite_path,
                    &config.pool_options,
                    BoolColumns::new(config.bool_columns.iter().cloned()),
                )
                .await?,
            ),
        };

        let pool = Self { backend };
        info!(mode = %pool.mode(), "Database pool ready");
        Ok(pool)
    }

    pub fn mode(&self) -> StoreMode {
        match self.backend {
            Backend::Networked(_) => StoreMode::Networked,
            Backend::Embedded(_) => StoreMode::Embedded,
        }
    }

    /// Run one statement written in PostgreSQL dialect with `$1..$n` placeholders.
    pub async fn query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        impl_backend_dispatch!(&self.backend, {
            Networked(store) => store.query(sql, params).await,
            Embedded(store) => store.query(sql, params).await,
        })
    }

    /// Get a session for running several statements on one connection.
    pub async fn connect(&self) -> DbResult<Session> {
        impl_backend_dispatch!(&self.backend, {
            Networked(store) => {
                let conn = store.acquire().await?;
                Ok(Session::networked(conn, store.clone()))
            },
            Embedded(store) => Ok(Session::embedded(store.clone())),
        })
    }

    /// Start a transaction with explicit commit and rollback.
    pub async fn begin(&self) -> DbResult<Transaction> {
        impl_backend_dispatch!(&self.backend, {
            Networked(store) => store.begin().await,
            Embedded(store) => store.begin().await,
        })
    }

    /// Run `body` inside a transaction.
    ///
    /// Commits when `body` returns `Ok`. On `Err` the transaction is rolled back
    /// and the body's error is returned.
    ///
    /// ```no_run
    /// # async fn demo(pool: dual_pool::Pool) -> dual_pool::DbResult<()> {
    /// pool.transaction(|tx| {
    ///     Box::pin(async move {
    ///         tx.query("UPDATE accounts SET balance = balance - 10 WHERE id = $1", &[1.into()])
    ///             .await?;
    ///         tx.query("UPDATE accounts SET balance = balance + 10 WHERE id = $1", &[2.into()])
    ///             .await?;
    ///         Ok(())
    ///     })
    /// })
    /// .await
    /// # }
    /// ```
    pub async fn transaction<T, F>(&self, body: F) -> DbResult<T>
    where
        F: for<'c> FnOnce(&'c mut Transaction) -> BoxFuture<'c, DbResult<T>>,
    {
        let mut tx = self.begin().await?;
        match body(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                let id = tx.id().to_string();
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        transaction_id = %id,
                        error = %rollback_err,
                        "Rollback after failed transaction body also failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Close the backend pool. Safe to call more than once.
    pub async fn end(&self) {
        if self.is_closed() {
            debug!("Pool already closed");
            return;
        }
        info!(mode = %self.mode(), "Closing database pool");
        impl_backend_dispatch!(&self.backend, {
            Networked(store) => store.close().await,
            Embedded(store) => store.close().await,
        })
    }

    pub fn is_closed(&self) -> bool {
        impl_backend_dispatch!(&self.backend, {
            Networked(store) => store.is_closed(),
            Embedded(store) => store.is_closed(),
        })
    }

    /// Admission check; always true on the embedded backend.
    pub fn check_circuit_breaker(&self) -> bool {
        match &self.backend {
            Backend::Networked(store) => store.breaker().check(),
            Backend::Embedded(_) => true,
        }
    }

    pub async fn stats(&self) -> PoolStats {
        let closed = self.is_closed();
        let (backend, circuit_breaker) = match &self.backend {
            Backend::Networked(store) => (store.stats(), Some(store.breaker().snapshot())),
            Backend::Embedded(store) if closed => (
                BackendStats::Embedded {
                    path: store.path().display().to_string(),
                    journal_mode: None,
                    page_count: None,
                    page_size: None,
                    size: None,
                },
                None,
            ),
            Backend::Embedded(store) => (store.stats().await, None),
        };

        let breaker_open = circuit_breaker
            .as_ref()
            .is_some_and(|cb| cb.state == BreakerState::Open);

        PoolStats {
            mode: self.mode(),
            healthy: !closed && !breaker_open,
            closed,
            backend,
            circuit_breaker,
            error: closed.then(|| "Pool is closed".to_string()),
        }
    }

    /// Run `SELECT 1` and report the outcome.
    pub async fn health_check(&self) -> HealthStatus {
        let mode = self.mode();
        let start = Instant::now();
        let outcome = if self.is_closed() {
            Err(DbError::connection("Pool is closed", "The pool has been ended"))
        } else {
            self.query("SELECT 1", &[]).await
        };
        let circuit_breaker = match &self.backend {
            Backend::Networked(store) => Some(store.breaker().snapshot()),
            Backend::Embedded(_) => None,
        };

        match outcome {
            Ok(_) => HealthStatus::ok(mode, start.elapsed().as_millis() as u64, circuit_breaker),
            Err(e) => {
                warn!(mode = %mode, error = %e, "Health check failed");
                HealthStatus::failed(mode, e.to_string(), circuit_breaker)
            }
        }
    }
}
