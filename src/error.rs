//! Crate-wide error types.

use thiserror::Error;

/// Errors surfaced by the catalog store, backup handling and the offload
/// coordinator.
///
/// Matcher expression failures and per-path import failures never appear
/// here: they degrade to "no match" / "path skipped" by design.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Project {0} not found")]
    ProjectNotFound(String),
    #[error("Endpoint {0} not found")]
    EndpointNotFound(String),
    #[error("Response {0} not found")]
    ResponseNotFound(String),
    #[error("Invalid backup document: {0}")]
    InvalidBackup(String),
    #[error("Background task timed out")]
    WorkerTimeout,
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
