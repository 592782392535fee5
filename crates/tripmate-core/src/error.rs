//! Error types for the chat core

use thiserror::Error;

/// Classification of a failed completion call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// Connection refused, DNS, timeouts
    Network,
    /// Credential rejected (401, 403)
    Auth,
    /// Rate limit or quota exhausted (429)
    Quota,
    /// Request rejected by the service (400)
    InvalidRequest,
    /// 5xx from the service
    Server,
    /// 2xx with a body we could not use
    MalformedResponse,
    Unknown,
}

/// A completion call that did not produce text
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Auth, message)
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Quota, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidRequest, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Server, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::MalformedResponse, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Unknown, message)
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("completion service unavailable: {0}")]
    ServiceUnavailable(#[from] ServiceError),

    #[error("{0}")]
    Validation(String),
}

impl ChatError {
    pub fn empty_message() -> Self {
        ChatError::Validation("cannot send an empty message".to_string())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ChatError::Validation(_))
    }
}
