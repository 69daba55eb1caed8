//! UseCase layer error types.
//!
//! The UI layer maps each variant to a wire error code.

use thiserror::Error;

use crate::domain::StoreError;

/// Identity claim errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmitError {
    /// The connection already claimed an identity
    #[error("connection is already authenticated")]
    AlreadyAuthenticated,

    /// Session policy forbids a second live connection for the user
    #[error("user '{0}' already has a live session")]
    DuplicateIdentity(String),
}

/// Room join errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("connection has not claimed an identity")]
    NotAuthenticated,
}

/// Room leave errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaveError {
    #[error("connection has not claimed an identity")]
    NotAuthenticated,

    #[error("connection is not in room '{0}'")]
    NotInRoom(String),
}

/// Message send errors.
///
/// Persistence failures are not errors here: the message is broadcast with a
/// temporary id instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    #[error("connection has not claimed an identity")]
    NotAuthenticated,

    #[error("connection is not in room '{0}'")]
    NotInRoom(String),

    #[error("message body must not be empty")]
    EmptyBody,

    #[error("message body must be at most {max} characters")]
    BodyTooLong { max: usize },
}

/// Reaction errors; none of them is ever broadcast
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactError {
    #[error("connection has not claimed an identity")]
    NotAuthenticated,

    #[error("invalid reaction: {0}")]
    InvalidReaction(String),

    #[error("message '{0}' not found")]
    MessageNotFound(String),

    #[error("reaction could not be saved: {0}")]
    Store(StoreError),
}

/// Typing indicator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypingError {
    #[error("connection has not claimed an identity")]
    NotAuthenticated,

    #[error("connection is not in room '{0}'")]
    NotInRoom(String),
}
