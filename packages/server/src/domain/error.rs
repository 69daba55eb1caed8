//! Domain error types.

use thiserror::Error;

/// Value object construction errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    /// The value is empty (after trimming, where applicable)
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// The value exceeds the maximum length
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}

/// Persistence collaborator errors.
///
/// Every variant is treated as "store unavailable" by the degraded paths; the
/// distinction only matters for logging and for reactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store call '{operation}' timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("message '{0}' not found")]
    MessageNotFound(String),
}

/// Outbound push errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' not found")]
    ClientNotFound(String),

    #[error("push failed: {0}")]
    PushFailed(String),
}

/// Connection registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Another live connection already holds this user id and the session
    /// policy forbids multiple sessions.
    #[error("user '{0}' already has a live session")]
    DuplicateIdentity(String),

    /// The connection already claimed an identity.
    #[error("connection '{0}' is already authenticated")]
    AlreadyAdmitted(String),

    #[error("connection '{0}' is not registered")]
    ConnectionNotFound(String),
}
