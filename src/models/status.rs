//! Diagnostics returned by `Pool::stats` and `Pool::health_check`.
//!
//! Both types are plain data and never carry an error as `Err`: failures are
//! captured in `healthy` and `error`.

use crate::db::breaker::BreakerSnapshot;
use crate::models::StoreMode;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Backend occupancy details.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendStats {
    Networked {
        /// Connection string with the password masked
        target: String,
        total_connections: u32,
        idle_connections: usize,
        max_connections: u32,
    },
    Embedded {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        journal_mode: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        page_count: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        page_size: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub mode: StoreMode,
    pub healthy: bool,
    pub closed: bool,
    pub backend: BackendStats,
    /// Only present on the networked backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<BreakerSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub mode: StoreMode,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<BreakerSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn ok(mode: StoreMode, latency_ms: u64, circuit_breaker: Option<BreakerSnapshot>) -> Self {
        Self {
            mode,
            healthy: true,
            latency_ms: Some(latency_ms),
            checked_at: Utc::now(),
            circuit_breaker,
            error: None,
        }
    }

    pub fn failed(
        mode: StoreMode,
        error: impl Into<String>,
        circuit_breaker: Option<BreakerSnapshot>,
    ) -> Self {
        Self {
            mode,
            healthy: false,
            latency_ms: None,
            checked_at: Utc::now(),
            circuit_breaker,
            error: Some(error.into()),
        }
    }
}
