//! Error handling for the scrypt mining client
//!
//! A single error type covers the whole fetch/search/submit cycle. Each
//! variant knows whether the cycle that produced it is worth retrying.

use thiserror::Error;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the mining client
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed hex or wrong-length work template fields
    #[error("Format error: {message}")]
    Format { message: String },

    /// Word-wise byte reversal on a buffer that is not a multiple of 4 bytes
    #[error("Alignment error: buffer length {len} is not a multiple of 4")]
    Alignment { len: usize },

    /// Hash parameter or output failures
    #[error("Cryptographic error: {message}")]
    Crypto { message: String },

    /// JSON-RPC level failures reported by the mining server
    #[error("RPC error: {message}")]
    Rpc { message: String },

    /// Mining worker failures
    #[error("Worker error: {message}")]
    Worker { message: String },

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Network errors
    #[error("Network error: {message}")]
    Network { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create an alignment error for a buffer of the given length
    pub fn alignment(len: usize) -> Self {
        Self::Alignment { len }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create an RPC error
    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc {
            message: message.into(),
        }
    }

    /// Create a worker error
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => {
                if let Some(status) = e.status() {
                    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                } else {
                    e.is_timeout() || e.is_connect() || e.is_request()
                }
            }
            Error::Network { .. } => true,
            Error::Timeout { .. } => true,
            Error::Io(_) => true,
            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Http(_) => "http",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
            Error::Config { .. } => "config",
            Error::Format { .. } => "format",
            Error::Alignment { .. } => "alignment",
            Error::Crypto { .. } => "crypto",
            Error::Rpc { .. } => "rpc",
            Error::Worker { .. } => "worker",
            Error::Timeout { .. } => "timeout",
            Error::Network { .. } => "network",
        }
    }
}
