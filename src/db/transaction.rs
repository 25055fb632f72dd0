//! Backend-specific transaction wrapper.
//!
//! A transaction holds one connection from BEGIN until `commit` or `rollback`.
//! On the embedded backend that is the only connection, so statements issued
//! while a transaction is open must go through it.

use crate::db::breaker::CircuitBreaker;
use crate::db::types::BoolColumns;
use crate::db::{embedded, networked};
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryResult, StoreMode};
use sqlx::{Postgres, Sqlite};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

enum Inner {
    Networked {
        tx: sqlx::Transaction<'static, Postgres>,
        breaker: Arc<CircuitBreaker>,
    },
    Embedded {
        tx: sqlx::Transaction<'static, Sqlite>,
        bool_columns: Arc<BoolColumns>,
    },
}

pub struct Transaction {
    id: String,
    started_at: Instant,
    inner: Inner,
}

impl Transaction {
    pub(crate) fn networked(
        tx: sqlx::Transaction<'static, Postgres>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self::new(Inner::Networked { tx, breaker })
    }

    pub(crate) fn embedded(
        tx: sqlx::Transaction<'static, Sqlite>,
        bool_columns: Arc<BoolColumns>,
    ) -> Self {
        Self::new(Inner::Embedded { tx, bool_columns })
    }

    fn new(inner: Inner) -> Self {
        let tx = Self {
            id: format!("tx_{}", uuid::Uuid::new_v4()),
            started_at: Instant::now(),
            inner,
        };
        info!(transaction_id = %tx.id, mode = %tx.mode(), "Transaction started");
        tx
    }

    /// Unique transaction identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> StoreMode {
        match self.inner {
            Inner::Networked { .. } => StoreMode::Networked,
            Inner::Embedded { .. } => StoreMode::Embedded,
        }
    }

    pub async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        debug!(transaction_id = %self.id, sql = %sql, "Executing in transaction");
        match &mut self.inner {
            Inner::Networked { tx, .. } => networked::run(&mut **tx, sql, params)
                .await
                .map_err(DbError::from),
            Inner::Embedded { tx, bool_columns } => {
                embedded::run(&mut **tx, sql, params, bool_columns).await
            }
        }
    }

    /// Commit the transaction. A networked commit clears the breaker's failure count.
    pub async fn commit(self) -> DbResult<()> {
        let Self {
            id,
            started_at,
            inner,
        } = self;
        let result = match inner {
            Inner::Networked { tx, breaker } => {
                let result = tx.commit().await;
                settle_commit(&breaker, result.is_ok());
                result
            }
            Inner::Embedded { tx, .. } => tx.commit().await,
        };

        match result {
            Ok(()) => {
                info!(
                    transaction_id = %id,
                    duration_ms = started_at.elapsed().as_millis() as u64,
                    "Transaction committed"
                );
                Ok(())
            }
            Err(e) => {
                warn!(transaction_id = %id, error = %e, "Commit failed");
                Err(DbError::transaction(format!("Commit failed: {}", e), id))
            }
        }
    }

    /// Roll back the transaction. A networked rollback counts as a breaker failure.
    pub async fn rollback(self) -> DbResult<()> {
        let Self { id, inner, .. } = self;
        let result = match inner {
            Inner::Networked { tx, breaker } => {
                settle_rollback(&breaker);
                tx.rollback().await
            }
            Inner::Embedded { tx, .. } => tx.rollback().await,
        };

        match result {
            Ok(()) => {
                info!(transaction_id = %id, "Transaction rolled back");
                Ok(())
            }
            Err(e) => {
                warn!(transaction_id = %id, error = %e, "Rollback failed");
                Err(DbError::transaction(format!("Rollback failed: {}", e), id))
            }
        }
    }
}

/// A commit clears the failure count without touching the state; a failed
/// commit counts as one failure.
fn settle_commit(breaker: &CircuitBreaker, committed: bool) {
    if committed {
        breaker.reset_failures();
    } else {
        breaker.record_failure();
    }
}

fn settle_rollback(breaker: &CircuitBreaker) {
    breaker.record_failure();
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("mode", &self.mode())
            .finish()
    }
}
