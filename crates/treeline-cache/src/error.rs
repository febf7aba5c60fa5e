//! Error type shared across the cache crate.

use thiserror::Error;

/// Coarse classification carried by every error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Code {
    /// The caller handed us something malformed.
    InvalidArgument,
    /// A cache lookup came up empty where data was required.
    NotFound,
    /// The transport failed to reach the server or decode its answer.
    Transport,
    Other,
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct CacheError {
    pub code: Code,
    pub message: String,
}

impl CacheError {
    pub fn new(code: Code, message: impl Into<String>) -> CacheError {
        CacheError {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> CacheError {
        CacheError::new(Code::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> CacheError {
        CacheError::new(Code::NotFound, message)
    }

    pub fn transport(message: impl Into<String>) -> CacheError {
        CacheError::new(Code::Transport, message)
    }

    pub fn other(message: impl Into<String>) -> CacheError {
        CacheError::new(Code::Other, message)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> CacheError {
        CacheError::other(format!("serialization failed: {err}"))
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> CacheError {
        CacheError::other(format!("storage failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
