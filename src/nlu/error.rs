//! NLU backend error types

use thiserror::Error;

/// NLU backend error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct NluError {
    pub kind: NluErrorKind,
    pub message: String,
}

impl NluError {
    pub fn new(kind: NluErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(NluErrorKind::Network, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(NluErrorKind::Auth, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(NluErrorKind::NotFound, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(NluErrorKind::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(NluErrorKind::InvalidResponse, message)
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(NluErrorKind::NotConfigured, message)
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NluErrorKind {
    /// Network issues, timeouts
    Network,
    /// Authentication failed (401, 403)
    Auth,
    /// Intent or project does not exist (404)
    NotFound,
    /// Server error (5xx)
    ServerError,
    /// Unexpected status or body
    InvalidResponse,
    /// Missing project id or credentials
    NotConfigured,
}

impl NluErrorKind {
    /// Whether a host-level retry of the same call could succeed
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::ServerError)
    }
}
