//! Error types shared across the pipeline.
//!
//! The variants follow the failure taxonomy of the merge pipeline: a request is
//! rejected before any work (`Validation`), a collaborator fails or times out
//! (`ExternalService`), the compositing engine fails (`Compositing`), or the
//! durable store cannot be updated (`Persistence`).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or disallowed request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Collaborator call failed, returned a non-success status or timed out
    #[error("{service} error: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    /// Compositing engine invocation failed
    #[error("Compositing error: {0}")]
    Compositing(#[from] CompositingError),

    /// Durable store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Referenced record or file does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Status machine refused a transition
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Merge was cancelled before completion
    #[error("Cancelled")]
    Cancelled,

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Error::ExternalService {
            service,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }
}

/// Failure of one compositing engine invocation.
#[derive(Error, Debug)]
pub enum CompositingError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: &'static str,
        status: String,
        stderr: String,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        program: &'static str,
        timeout: Duration,
    },

    #[error("could not read duration of {path:?}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("invalid invocation: {0}")]
    InvalidGraph(String),
}

/// Convenience Result type using the crate Error
pub type Result<T> = std::result::Result<T, Error>;
