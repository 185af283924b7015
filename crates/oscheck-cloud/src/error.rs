//! Cloud client error types

use thiserror::Error;

/// Errors raised by a testbed client
#[derive(Error, Debug)]
pub enum CloudError {
    /// The service rejected the token or the user has no role on the project.
    /// Checkers treat this as a per-project outcome, never as a run failure.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
