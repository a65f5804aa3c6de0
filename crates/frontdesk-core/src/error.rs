//! Error types for frontdesk-core

use thiserror::Error;

/// Result type alias using frontdesk-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in frontdesk-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote store unreachable or a read from it failed; sync cycles abort
    /// rather than act on a partial snapshot
    #[error("Remote unreachable: {0}")]
    Connectivity(String),

    /// An individual remote upsert/delete was rejected; the outbox entry is
    /// retained for retry
    #[error("Remote write rejected: {0}")]
    RemoteWrite(String),

    /// A remote row failed to translate into a local entity
    #[error("Mapping error: {0}")]
    Mapping(String),
}
