//! Database layer.
//!
//! - `pool`: the unified facade and backend selection
//! - `networked` / `embedded`: PostgreSQL and SQLite executors
//! - `breaker`: circuit breaker guarding the networked backend
//! - `transaction` / `session`: connection-scoped handles
//! - `types` / `params`: row decoding and parameter binding

pub mod breaker;
pub mod embedded;
pub mod macros;
pub mod networked;
pub mod params;
pub mod pool;
pub mod session;
pub mod transaction;
pub mod types;

pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use embedded::EmbeddedStore;
pub use networked::{NetworkedStore, is_connection_class};
pub use pool::Pool;
pub use session::Session;
pub use transaction::Transaction;
pub use types::{BoolColumns, DEFAULT_BOOL_COLUMNS};
