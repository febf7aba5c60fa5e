//! Error type for snapshot construction and validation.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Priority values must be plain strings or numbers.
    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    /// JSON that cannot be represented as a snapshot node.
    #[error("invalid node: {0}")]
    InvalidNode(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, TreeError>;
