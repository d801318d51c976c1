//! Error types for Slip

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// A collaborator could not be reached or refused the request
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error came from an external collaborator (persistence,
    /// object storage, identity) rather than from bad input
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Pool(_)
                | Self::Io(_)
                | Self::Storage(_)
                | Self::Unavailable(_)
                | Self::Auth(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
