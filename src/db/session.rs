//! Sessions returned by `Pool::connect`.

use crate::db::embedded::EmbeddedStore;
use crate::db::networked::NetworkedStore;
use crate::error::DbResult;
use crate::models::{QueryParam, QueryResult, StoreMode};
use sqlx::Postgres;
use sqlx::pool::PoolConnection;
use tracing::debug;

enum Inner {
    /// A dedicated pooled connection; statements run in order on it
    Networked {
        conn: PoolConnection<Postgres>,
        store: NetworkedStore,
    },
    /// A handle on the shared single-connection engine
    Embedded(EmbeddedStore),
}

/// A connection-scoped handle for running several statements.
pub struct Session {
    inner: Inner,
}

impl Session {
    pub(crate) fn networked(conn: PoolConnection<Postgres>, store: NetworkedStore) -> Self {
        Self {
            inner: Inner::Networked { conn, store },
        }
    }

    pub(crate) fn embedded(store: EmbeddedStore) -> Self {
        Self {
            inner: Inner::Embedded(store),
        }
    }

    pub fn mode(&self) -> StoreMode {
        match self.inner {
            Inner::Networked { .. } => StoreMode::Networked,
            Inner::Embedded(_) => StoreMode::Embedded,
        }
    }

    pub async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        match &mut self.inner {
            Inner::Networked { conn, store } => store.query_on(conn, sql, params).await,
            Inner::Embedded(store) => store.query(sql, params).await,
        }
    }

    /// Give the connection back. A no-op on the embedded backend.
    pub fn release(self) {
        if let Inner::Networked { conn, .. } = self.inner {
            debug!("Releasing session connection");
            drop(conn);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("mode", &self.mode()).finish()
    }
}
