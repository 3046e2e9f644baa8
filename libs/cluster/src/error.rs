//! Errors returned by cluster collaborators.

use thiserror::Error;

/// Errors from a collaborator call.
///
/// A missing lease is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The backend could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an error status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// A named object that must exist does not.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The backend refused the request.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ClusterError {
    /// Create an API error from response details.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound(_) | Self::Decode(_) | Self::Rejected(_) => false,
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
