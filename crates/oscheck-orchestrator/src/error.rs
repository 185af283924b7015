//! Orchestrator client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Malformed resource payload: {0}")]
    MalformedResource(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
