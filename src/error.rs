//! Error types for workshelf

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Permission denied: requires '{permission}'")]
    PermissionDenied { permission: String },

    #[error("Invalid transition: cannot {action} from {state}")]
    InvalidTransition { state: String, action: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate resource: {0}")]
    DuplicateResource(String),

    #[error("Already promoted: {0}")]
    AlreadyPromoted(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
