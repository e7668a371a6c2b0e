//! Error types for the Kia UVO integration

use ha_config_entries::ConfigEntriesError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for integration operations
pub type Result<T> = std::result::Result<T, KiaUvoError>;

#[derive(Debug, Error)]
pub enum KiaUvoError {
    /// Credentials were rejected or the token is no longer accepted
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),

    #[error("no vehicle registered to this account")]
    NoVehicle,

    #[error("not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to persist credentials: {0}")]
    ConfigEntries(#[from] ConfigEntriesError),
}

impl KiaUvoError {
    /// Auth failures block every later call until the token is replaced
    pub fn is_auth(&self) -> bool {
        matches!(self, KiaUvoError::Auth(_) | KiaUvoError::NotLoggedIn)
    }
}
