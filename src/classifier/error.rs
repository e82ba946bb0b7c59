//! Classifier error types

use std::time::Duration;
use thiserror::Error;

/// Classifier failure with classification for retry logic.
///
/// Any value of this type means the classifier is unavailable for the
/// current call. Callers surface it; they never read it as a "no".
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClassifierError {
    pub kind: ClassifierErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ClassifierError {
    pub fn new(kind: ClassifierErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::Timeout, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::Auth, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::InvalidRequest, message)
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::MalformedResponse, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ClassifierErrorKind::Unavailable, message)
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierErrorKind {
    /// Connection issues - retryable
    Network,
    /// Call exceeded the configured deadline - retryable
    Timeout,
    /// Rate limited (429) - retryable with backoff
    RateLimit,
    /// Server error (5xx) - retryable
    ServerError,
    /// Authentication failed (401, 403) - not retryable
    Auth,
    /// Bad request (400) - not retryable
    InvalidRequest,
    /// Response body was empty or did not carry a label
    MalformedResponse,
    /// No classifier configured
    Unavailable,
}

impl ClassifierErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::ServerError
        )
    }
}
