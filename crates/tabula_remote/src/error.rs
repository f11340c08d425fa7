//! Error types for the remote backend.

use tabula_core::CoreError;
use thiserror::Error;

/// Result type for remote operations.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by a remote document API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never got a response.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The server answered with a non-success status.
    #[error("server returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The record does not exist.
    #[error("record {id} not found in collection {collection}")]
    NotFound {
        /// Collection searched.
        collection: String,
        /// Identifier that missed.
        id: String,
    },

    /// The response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl RemoteError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        Self::Transport {
            message: message.into(),
            retryable,
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true if retrying the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. } | Self::Protocol(_) | Self::Codec(_) => false,
        }
    }

    /// Returns true for [`RemoteError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Converts into a core error, recording what was being attempted.
    #[must_use]
    pub fn into_core(self, context: impl Into<String>) -> CoreError {
        match self {
            Self::NotFound { collection, id } => CoreError::not_found(collection, id),
            other => CoreError::remote(context, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        let status = |status| RemoteError::Status {
            status,
            body: String::new(),
        };
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(400).is_retryable());
        assert!(RemoteError::transport("reset", true).is_retryable());
        assert!(!RemoteError::protocol("bad").is_retryable());
    }

    #[test]
    fn not_found_maps_to_core_not_found() {
        let err = RemoteError::NotFound {
            collection: "car".into(),
            id: "abc".into(),
        };
        assert!(err.into_core("getting car").is_not_found());
    }

    #[test]
    fn other_errors_keep_context_and_source() {
        let core = RemoteError::transport("refused", false).into_core("listing car");
        assert_eq!(
            core.to_string(),
            "remote error during listing car: transport error: refused"
        );
    }
}
