//! Error types for machine key parsing.

use thiserror::Error;

/// Errors that can occur when parsing a `namespace/name` key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key string is empty.
    #[error("key cannot be empty")]
    Empty,

    /// The key has more than one `/` separator.
    #[error("unexpected key format: {0:?}")]
    TooManySegments(String),

    /// A `/` is present but the namespace before it is empty.
    #[error("key {0:?} has an empty namespace")]
    EmptyNamespace(String),

    /// The name portion is empty.
    #[error("key {0:?} has an empty name")]
    EmptyName(String),
}
