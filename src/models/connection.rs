//! Backend-related data models.

use serde::{Deserialize, Serialize};
use url::Url;

/// Which backend a pool is bound to. Fixed for the lifetime of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Client/server PostgreSQL through a connection pool
    Networked,
    /// In-process SQLite file
    Embedded,
}

impl StoreMode {
    /// Get the display name for this mode.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Networked => "PostgreSQL",
            Self::Embedded => "SQLite",
        }
    }

    pub fn is_networked(&self) -> bool {
        matches!(self, Self::Networked)
    }
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Get a display-safe version of a connection string (password masked).
pub fn masked_connection_string(connection_string: &str) -> String {
    match Url::parse(connection_string) {
        Ok(mut url) if url.password().is_some() => {
            // set_password only fails for cannot-be-a-base URLs, which carry no password
            let _ = url.set_password(Some("****"));
            url.to_string()
        }
        Ok(_) => connection_string.to_string(),
        Err(_) => "<unparseable connection string>".to_string(),
    }
}
