//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;

/// Failure to obtain the session history.
///
/// `Clone` so one in-flight result can be handed to every waiting caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchError {
    #[error("no authenticated user is available")]
    Unauthenticated,
    #[error("session request failed with status {0}")]
    HttpStatus(u16),
    #[error("session request failed: {0}")]
    Transport(String),
    #[error("session history could not be decoded: {0}")]
    Decode(String),
    #[error("session history could not be read: {0}")]
    Io(String),
    #[error("the shared session fetch was abandoned before it finished")]
    Interrupted,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Invalid engine configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {raw:?}")]
    InvalidNumber { var: &'static str, raw: String },
    #[error("{var} cannot be empty")]
    Empty { var: &'static str },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no session source configured (set PROGRESS_API_BASE_URL)")]
    MissingSessionSource,
}
