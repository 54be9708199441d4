//! Error types for the wombat content repository

use std::fmt;
use thiserror::Error;

/// Classification exposed to callers so they can map a failure to a response
/// without inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NotFound,
    DatastoreError,
    ConversionError,
    BadRequest,
    NotRegistered,
    InvalidBackend,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::NotFound => "not found",
            Status::DatastoreError => "datastore error",
            Status::ConversionError => "conversion error",
            Status::BadRequest => "bad request",
            Status::NotRegistered => "not registered",
            Status::InvalidBackend => "invalid backend",
        };
        f.write_str(name)
    }
}

/// Content repository errors
#[derive(Error, Debug)]
pub enum WombatError {
    /// The document does not exist, or exists but is hidden from the caller
    #[error("{0} not found")]
    NotFound(String),

    #[error("Datastore error: {message}")]
    Datastore {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Image conversion failed: {0}")]
    Conversion(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("No backend registered for '{0}'")]
    NotRegistered(String),

    #[error("Invalid backend for '{key}': missing {capability} capability")]
    InvalidBackend { key: String, capability: &'static str },

    /// Mutation attempted on a document that was never bound to a printer
    #[error("Document {0} has no printer backend")]
    Unbound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Time error: {0}")]
    Time(#[from] time::error::ComponentRange),
}

impl WombatError {
    pub fn status(&self) -> Status {
        match self {
            WombatError::NotFound(_) => Status::NotFound,
            WombatError::Conversion(_) => Status::ConversionError,
            WombatError::BadRequest(_) => Status::BadRequest,
            WombatError::NotRegistered(_) => Status::NotRegistered,
            WombatError::InvalidBackend { .. } | WombatError::Unbound(_) => Status::InvalidBackend,
            WombatError::Datastore { .. }
            | WombatError::Io(_)
            | WombatError::Serialization(_)
            | WombatError::Time(_) => Status::DatastoreError,
        }
    }

    /// Wrap a storage-level failure with a message describing what was attempted
    pub fn datastore<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WombatError::Datastore {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn datastore_msg(message: impl Into<String>) -> Self {
        WombatError::Datastore {
            message: message.into(),
            source: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        WombatError::BadRequest(msg.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Status::NotFound
    }
}

/// Result type for content repository operations
pub type Result<T> = std::result::Result<T, WombatError>;
