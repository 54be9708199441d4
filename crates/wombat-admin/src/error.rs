//! Error handling for the admin tool

use thiserror::Error;
use wombat::{Status, WombatError};

/// Result type for admin operations
pub type Result<T> = std::result::Result<T, AdminError>;

/// Admin error types
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Wombat(#[from] WombatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdminError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            AdminError::Config(_) => 78,
            AdminError::Wombat(e) => match e.status() {
                Status::NotFound => 4,
                Status::BadRequest => 2,
                Status::NotRegistered | Status::InvalidBackend => 78,
                Status::DatastoreError | Status::ConversionError => 1,
            },
            AdminError::Io(_) | AdminError::Json(_) => 1,
        }
    }
}
