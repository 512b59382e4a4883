//! Error types for quill-core

use serde::Serialize;
use thiserror::Error;

/// Result type alias using quill-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in quill-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Remote call rejected, unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// No record at the requested path or id
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Malformed persisted payload or remote document
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Remote access attempted without a signed-in identity
    #[error("Sign-in required for remote access")]
    AuthRequired,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Local storage medium error
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Serialization(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Coarse error classification exposed to UI callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NetworkFailure,
    NotFound,
    SerializationFailure,
    AuthRequired,
    InvalidInput,
    Storage,
}

impl Error {
    /// Classify this error for the caller-facing result envelope
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Serialization(_) => ErrorKind::SerializationFailure,
            Self::AuthRequired => ErrorKind::AuthRequired,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_map_to_serialization_failure() {
        let error: Error = serde_json::from_str::<Vec<String>>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(error.kind(), ErrorKind::SerializationFailure);
    }

    #[test]
    fn kind_serializes_as_snake_case() {
        let rendered = serde_json::to_string(&ErrorKind::NetworkFailure).unwrap();
        assert_eq!(rendered, "\"network_failure\"");
    }
}
