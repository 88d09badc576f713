//! Common error types for Forager.

use std::fmt;

use thiserror::Error;

use crate::types::Operation;

/// Top-level error type for Forager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The protocol token matches no known backend.
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    /// Options were supplied but do not match the backend's shape.
    #[error("Invalid {0} options")]
    InvalidOptions(String),

    /// A byte range or range header could not be used.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// The resolved backend does not implement the operation.
    #[error("{protocol}: {operation} not supported")]
    Unsupported {
        protocol: String,
        operation: Operation,
    },

    /// A remote endpoint answered with a non-2xx status.
    #[error("HTTP {status}: {status_text}")]
    Response {
        status: u16,
        status_text: String,
        body: ResponseBody,
    },

    /// An expected response payload was absent.
    #[error("Missing content: {0}")]
    MissingContent(String),

    /// A listing response lacked required fields.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Content could not be decoded as text or JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A backend listing failed; the cause is intentionally dropped.
    #[error("Failed to list {0} contents")]
    ListFailed(String),

    /// A recursive listing went deeper than the configured limit.
    #[error("Directory depth limit of {limit} exceeded at {path}")]
    DepthLimitExceeded { path: String, limit: usize },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level failure talking to a remote backend.
    #[error("Network error: {0}")]
    Network(String),

    /// Backend SDK reported a failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Build the uniform "not supported" failure for a capability.
    pub fn unsupported(protocol: impl Into<String>, operation: Operation) -> Self {
        Self::Unsupported {
            protocol: protocol.into(),
            operation,
        }
    }
}

/// Body of a failed HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// The response declared a JSON content type.
    Json(serde_json::Value),
    /// Anything else, kept verbatim.
    Text(String),
}

impl fmt::Display for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{}", value),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
