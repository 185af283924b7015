//! Configuration error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Duplicate desired image '{name}' in scope '{scope}'")]
    DuplicateImage { scope: String, name: String },

    #[error("No testbeds defined in credentials file")]
    NoTestbeds,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
