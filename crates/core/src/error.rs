//! Error taxonomy shared across the workspace
//!
//! Every upstream-facing crate defines its own `thiserror` enum and maps it
//! into this closed taxonomy via `kind()`. The taxonomy drives propagation
//! policy: timeouts degrade to prefixes or templates, transient upstream
//! failures retry, auth failures reject, everything else falls back to a
//! safe utterance so the prospect never hears an error.

use serde::{Deserialize, Serialize};

/// Closed error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Retryable upstream failure (5xx, DNS, connection reset)
    TransientUpstream,
    /// Per-stage deadline exceeded
    Timeout,
    /// Empty or malformed webhook payload
    BadInput,
    /// Signature verification failed
    Auth,
    /// Unknown call id or terminal-state re-entry
    StateViolation,
    /// Invariant failure inside the process
    Internal,
}

impl ErrorKind {
    /// Whether a retry against the same upstream may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientUpstream)
    }
}

/// Core error
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("transient upstream failure: {0}")]
    TransientUpstream(String),

    #[error("deadline exceeded after {elapsed_ms}ms in {stage}")]
    Timeout { stage: &'static str, elapsed_ms: u64 },

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("state violation: {0}")]
    StateViolation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map into the closed taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TransientUpstream(_) => ErrorKind::TransientUpstream,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::BadInput(_) => ErrorKind::BadInput,
            Error::Auth(_) => ErrorKind::Auth,
            Error::StateViolation(_) => ErrorKind::StateViolation,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::TransientUpstream("503".into()).kind(),
            ErrorKind::TransientUpstream
        );
        assert_eq!(
            Error::Timeout { stage: "llm", elapsed_ms: 6000 }.kind(),
            ErrorKind::Timeout
        );
        assert_eq!(Error::Auth("bad sig".into()).kind(), ErrorKind::Auth);
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorKind::TransientUpstream.is_retryable());
        assert!(!ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }
}
