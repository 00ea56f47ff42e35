//! Error types for backdrop

use std::time::Duration;
use thiserror::Error;

/// Result type alias for backdrop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
///
/// Only CLI setup paths surface these. The refresh orchestrator absorbs its own
/// failures and reports them through diagnostics instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Interactive prompt error: {0}")]
    Dialoguer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

impl From<dialoguer::Error> for Error {
    fn from(err: dialoguer::Error) -> Self {
        Error::Dialoguer(err.to_string())
    }
}

/// Failures while building a query or fetching an artifact from the provider
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Photo provider rejected the access key. Run `backdrop init` to set one.")]
    Unauthorized,

    #[error("Photo provider rate limit exceeded. Retry after {0:?}")]
    RateLimited(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("Photo provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Query could not be built: {0}")]
    Query(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            FetchError::Network("Failed to connect".to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Weather or location context could not be acquired
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("Context unavailable: {0}")]
    Unavailable(String),
}

/// An artifact could not be fully retrieved or decoded before presentation
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("Image did not become ready within {0:?}")]
    Timeout(Duration),

    #[error("Image download failed: {0}")]
    Download(String),

    #[error("Downloaded body is not a decodable image: {0}")]
    NotAnImage(String),
}

/// Cache storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found. Run `backdrop init` to set up.")]
    NotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
