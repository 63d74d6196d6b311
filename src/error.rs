// src/error.rs

//! Unified error handling for the collection application.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad constructor or call parameters
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed or calendar-invalid date string
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Upstream API returned a non-2xx status
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Upstream API returned 429
    #[error("API rate limit exceeded")]
    RateLimited { retry_after: Option<f64> },

    /// Upstream JSON did not match the expected shape
    #[error("Schema validation failed for {context}: {message}")]
    Schema { context: String, message: String },

    /// All storage write strategies exhausted
    #[error("Storage write failed for {path}: {message}")]
    StorageWrite { path: PathBuf, message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Columnar encode/decode failed
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    /// Parquet encode/decode failed
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Collection error
    #[error("Collection error for {context}: {message}")]
    Collection { context: String, message: String },
}

impl AppError {
    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an invalid-date error.
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDate(message.into())
    }

    /// Create a schema validation error with context.
    pub fn schema(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Schema {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage write error.
    pub fn storage_write(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::StorageWrite {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a collection error with context.
    pub fn collection(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Collection {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Short static name for this error's kind, used to tag pipeline metadata
    /// and monitoring events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgument",
            Self::InvalidDate(_) => "InvalidDate",
            Self::Api { .. } => "ApiError",
            Self::RateLimited { .. } => "RateLimitExceeded",
            Self::Schema { .. } => "SchemaValidationError",
            Self::StorageWrite { .. } => "StorageWriteError",
            Self::Io(_) => "IoError",
            Self::Http(_) => "HttpError",
            Self::Json(_) => "JsonError",
            Self::Toml(_) => "TomlError",
            Self::Arrow(_) => "ArrowError",
            Self::Parquet(_) => "ParquetError",
            Self::Config(_) => "ConfigError",
            Self::Validation(_) => "ValidationError",
            Self::Collection { .. } => "CollectionError",
        }
    }

    /// Whether a retry has any chance of succeeding.
    ///
    /// Rate limits, transport-level failures and upstream 5xx responses are
    /// transient; everything else fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}
