//! Error types for the Pebble client crate.

use thiserror::Error;

/// Errors that can occur while talking to a workload's Pebble API.
#[derive(Error, Debug)]
pub enum PebbleError {
    /// The Pebble endpoint could not be reached.
    #[error("cannot connect to Pebble: {0}")]
    Connection(String),

    /// Pebble answered with an error envelope.
    #[error("Pebble API error ({status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Message from the error envelope.
        message: String,
    },

    /// The named service is not in the plan.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// A layer with this label exists and combine was not requested.
    #[error("layer {0:?} already exists")]
    LayerExists(String),

    /// An async change finished with an error.
    #[error("change {id} failed: {message}")]
    ChangeFailed {
        /// Change identifier.
        id: String,
        /// Error reported by the change.
        message: String,
    },

    /// Pebble rejected an operation on a single path.
    #[error("cannot write {path}: {message}")]
    PathError {
        /// Path inside the workload.
        path: String,
        /// Error reported for the path.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("failed to decode Pebble response: {0}")]
    Decode(String),

    /// A plan or layer document could not be (de)serialized.
    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PebbleError {
    /// Returns true if the endpoint was unreachable.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this error is retriable.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ChangeFailed { .. })
    }
}

impl From<reqwest::Error> for PebbleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::Connection(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::Decode(err.to_string())
        } else {
            Self::Api {
                status: err.status().map_or(0, |s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }
}

/// A specialized Result type for Pebble operations.
pub type Result<T> = std::result::Result<T, PebbleError>;
