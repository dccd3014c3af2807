//! Error types for cluster access.

use mapicheck_model::ResourceKind;
use thiserror::Error;

/// Errors returned by a [`ClusterAccess`](crate::ClusterAccess) implementation.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The requested resource does not exist.
    #[error("{kind} {name:?} not found")]
    NotFound { kind: ResourceKind, name: String },

    /// The API server rejected the request.
    #[error("API error ({status} {reason}): {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },

    /// The request never got a response.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The client could not be built from its settings.
    #[error("invalid client configuration: {0}")]
    Config(String),

    /// The response body did not have the expected shape.
    #[error("failed to decode {kind}: {message}")]
    Decode { kind: ResourceKind, message: String },
}

impl ClusterError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// A 503 from the API server, the usual shape of a brief outage.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Api {
            status: 503,
            reason: "ServiceUnavailable".to_string(),
            message: message.into(),
        }
    }

    /// Returns true if the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if a write lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status: 409, .. })
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. } | Self::Config(_) | Self::Decode { .. } => false,
        }
    }
}
