//! Error types for swipe-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::feed::FeedError;

/// Result type alias using swipe-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in swipe-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream listings feed error
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Background task or scheduling failure
    #[error("Task error: {0}")]
    Task(String),
}

impl Error {
    /// Whether the failure originated upstream rather than in local storage.
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Feed(_))
    }
}
