//! ==============================================================================
//! error.rs - failure taxonomy for the sync layer
//! ==============================================================================
//!
//! transient failures (a single failed attempt) never leave client.rs - the
//! retry loop swallows them. what escapes is one of:
//!
//! ```text
//!     NetworkError      retries exhausted (terminal). absorbed on read paths,
//!                       surfaced on control paths.
//!     Validation        bad control input (rejected before any request) or a
//!                       device body that does not match the expected schema.
//!     Rejected          device answered 2xx but reported a non-success status.
//! ```
//!
//! ==============================================================================

use thiserror::Error;

/// terminal network failure after the retry policy gave up
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request failed after {attempts} attempt(s): {cause}")]
pub struct NetworkError {
    /// message of the last underlying failure (transport error or http status)
    pub cause: String,
    /// number of physical attempts made
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("device rejected command: {0}")]
    Rejected(String),
}

impl SyncError {
    pub fn validation(msg: impl Into<String>) -> Self {
        SyncError::Validation(msg.into())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_message_carries_attempts_and_cause() {
        let err = NetworkError { cause: "HTTP 503".into(), attempts: 4 };
        assert_eq!(err.to_string(), "request failed after 4 attempt(s): HTTP 503");
        let wrapped: SyncError = err.into();
        assert!(wrapped.is_network());
        assert!(wrapped.to_string().contains("HTTP 503"));
    }
}
