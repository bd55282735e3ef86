//! Error handling for the pool connection subsystem
//!
//! Network and protocol failures are signalled through events and
//! counters, never through this type; `Error` covers the API seams
//! (parsing, configuration, pool-list mutation).

use thiserror::Error;

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pool connection subsystem
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed pool endpoint URI
    #[error("Invalid endpoint: {message}")]
    Endpoint { message: String },

    /// Malformed 32-byte hash value
    #[error("Invalid hash: {message}")]
    Hash { message: String },

    /// Malformed HTTP response framing
    #[error("Malformed HTTP response: {message}")]
    Http { message: String },

    /// Connection index outside the configured pool list
    #[error("Connection index {index} is out of range")]
    IndexOutOfRange { index: usize },

    /// Attempt to remove the connection currently in use
    #[error("Connection {index} is active and cannot be removed")]
    ActiveConnection { index: usize },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an endpoint error
    pub fn endpoint(message: impl Into<String>) -> Self {
        Self::Endpoint {
            message: message.into(),
        }
    }

    /// Create a hash error
    pub fn hash(message: impl Into<String>) -> Self {
        Self::Hash {
            message: message.into(),
        }
    }

    /// Create an HTTP framing error
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }
}
