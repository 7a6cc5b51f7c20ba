//! Error types for the relay.
//!
//! [`RelayError`] separates failures by which collaborator rejected the call, so the feed loop can
//! decide what is fatal: a failed create aborts the stream, failed edits and typing pings do not.

use thiserror::Error;

/// Top-level error: which collaborator failed.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The chat backend stream could not be started or failed mid-stream.
    #[error("Producer error: {0}")]
    Producer(String),

    /// The messaging surface rejected creating the reply.
    #[error("Send error: {0}")]
    Send(String),

    /// The messaging surface rejected editing an existing message.
    #[error("Edit error: {0}")]
    Edit(String),

    /// Typing indicator failed; always non-fatal.
    #[error("Liveness error: {0}")]
    Liveness(String),

    /// An operation was called in a lifecycle state that does not allow it. A caller bug, not a
    /// transport failure.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),
}

/// Errors produced by handlers.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Conversation queue closed for chat {0}")]
    QueueClosed(i64),
}

/// Result type for core operations; uses [`RelayError`].
pub type Result<T> = std::result::Result<T, RelayError>;
