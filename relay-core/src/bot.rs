//! Messaging surface abstraction.
//!
//! [`Bot`] is transport-agnostic; `relay-telegram` implements it via teloxide and tests substitute
//! recording mocks.

use crate::error::Result;
use crate::types::{Chat, Message};
use async_trait::async_trait;

/// Outbound calls the relay makes against a chat platform.
///
/// Errors are expected to be [`RelayError::Send`](crate::RelayError::Send) for `reply_to`,
/// [`RelayError::Edit`](crate::RelayError::Edit) for `edit_message` and
/// [`RelayError::Liveness`](crate::RelayError::Liveness) for `send_typing`.
#[async_trait]
pub trait Bot: Send + Sync {
    /// Creates a reply to `message` and returns the new message id, which later edits target.
    /// Notices and command acknowledgements are sent as replies too.
    async fn reply_to(&self, message: &Message, text: &str) -> Result<String>;
    /// Replaces the text of a message previously created with [`reply_to`](Self::reply_to).
    async fn edit_message(&self, chat: &Chat, message_id: &str, text: &str) -> Result<()>;
    /// Shows a short-lived "typing…" indicator. Best effort.
    async fn send_typing(&self, chat: &Chat) -> Result<()>;
}
