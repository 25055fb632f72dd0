//! dual-pool
//!
//! One query interface over two backends: a networked PostgreSQL pool guarded
//! by a circuit breaker, or an embedded SQLite file. Statements are written in
//! PostgreSQL dialect and translated when they run on SQLite.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sql;

pub use config::{Config, PoolOptions, StoreConfig};
pub use db::{Pool, Session, Transaction};
pub use error::{DbError, DbResult};
pub use models::{QueryParam, QueryResult, Row, StoreMode};
