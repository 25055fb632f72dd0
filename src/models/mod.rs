//! Data models for the dual-backend pool.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod status;

// Re-export commonly used types
pub use connection::{StoreMode, masked_connection_string};
pub use query::{QueryParam, QueryResult, Row};
pub use status::{BackendStats, HealthStatus, PoolStats};
