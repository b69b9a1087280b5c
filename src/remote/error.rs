//! Remote service error types

use thiserror::Error;

/// Remote call failure with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Network, message)
    }

    pub fn status(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Status, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Decode, message)
    }

    pub fn business(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Business, message)
    }
}

/// Error classification
///
/// Everything except `Business` is a transport failure. Both classes are
/// surfaced to the user the same way and neither is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Unreachable host, timeout, connection reset
    Network,
    /// Non-2xx HTTP status
    Status,
    /// 2xx response whose body could not be parsed
    Decode,
    /// 2xx response reporting a non-success status
    Business,
}

impl RemoteErrorKind {
    pub fn is_transport(self) -> bool {
        !matches!(self, Self::Business)
    }
}
