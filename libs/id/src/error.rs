//! Error types for ID parsing.

use thiserror::Error;

/// Errors that can occur when parsing IDs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The ID string is empty.
    #[error("{kind} ID cannot be empty")]
    Empty { kind: &'static str },

    /// The ID is not a non-negative integer.
    #[error("invalid {kind} ID: '{input}' is not a non-negative integer")]
    NotNumeric { kind: &'static str, input: String },
}

impl IdError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, IdError::Empty { .. })
    }

    /// The resource kind the input was parsed as.
    pub fn kind(&self) -> &'static str {
        match self {
            IdError::Empty { kind } | IdError::NotNumeric { kind, .. } => kind,
        }
    }
}
