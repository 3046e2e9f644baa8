//! Error types for name parsing and validation.

use thiserror::Error;

/// Errors that can occur when parsing or validating names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The name string is empty.
    #[error("name cannot be empty")]
    Empty,

    /// The name exceeds the maximum length.
    #[error("name is {len} characters long, maximum is {max}")]
    TooLong { len: usize, max: usize },

    /// The name contains a character outside the allowed set.
    #[error("invalid character {ch:?} at position {position}")]
    InvalidChar { ch: char, position: usize },

    /// The name starts or ends with a separator.
    #[error("name must start and end with an alphanumeric character: {0:?}")]
    InvalidBoundary(String),
}

impl NameError {
    /// Returns true if this error indicates the input was empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, NameError::Empty)
    }
}
