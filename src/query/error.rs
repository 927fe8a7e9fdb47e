use std::error::Error as StdError;

use thiserror::Error;

/// Error produced by a fetch or write operation.
///
/// Errors are stored in the shared cache and handed to every binding of a
/// key, so they are cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("{0}")]
    Failed(String),
}

impl QueryError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Whether a retry policy may repeat the operation after this error.
    ///
    /// Client errors (4xx) and undecodable bodies are deterministic and
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Network(_) | Self::Failed(_) => true,
            Self::Decode(_) => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error returned by `on_success`/`on_error` callbacks of a mutation.
pub type CallbackError = Box<dyn StdError + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(QueryError::network("connection reset").is_retryable());
        assert!(QueryError::status(503, "unavailable").is_retryable());
        assert!(QueryError::failed("boom").is_retryable());
        assert!(!QueryError::status(404, "Newsletter not found").is_retryable());
        assert!(!QueryError::status(409, "conflict").is_retryable());
        assert!(!QueryError::decode("expected value").is_retryable());
    }

    #[test]
    fn display_includes_status_and_message() {
        let err = QueryError::status(404, "Newsletter not found");
        assert_eq!(
            err.to_string(),
            "request failed with status 404: Newsletter not found"
        );
        assert_eq!(err.http_status(), Some(404));
        assert_eq!(QueryError::failed("conflict").to_string(), "conflict");
        assert_eq!(QueryError::failed("conflict").http_status(), None);
    }
}
