use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Main error type for zenfeed
#[derive(Error, Debug)]
pub enum ZenfeedError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Transport errors talking to an external service
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The classification service answered but the answer was unusable
    #[error("LLM error: {0}")]
    Llm(String),

    /// The video search service failed or returned nothing usable
    #[error("Search error: {0}")]
    Search(String),

    /// Client store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Server errors
    #[error("Server error: {0}")]
    Server(String),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for zenfeed operations
pub type Result<T> = std::result::Result<T, ZenfeedError>;
