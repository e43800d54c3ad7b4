//! Domain error model.
//!
//! Deliberately small: the batch pipeline treats malformed metadata as
//! "not eligible this run" rather than an error, so the only deterministic
//! domain failure left is a bad identifier.

use thiserror::Error;

/// Domain-level error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
