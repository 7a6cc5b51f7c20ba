//! Chat backend feed contract: a backend turns a query into a lazy stream of [`Snapshot`]s.

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Full response text accumulated so far, plus the continuation tokens for the next turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub text: String,
    pub conversation_id: String,
    pub message_id: String,
}

impl Snapshot {
    pub fn new(
        text: impl Into<String>,
        conversation_id: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            conversation_id: conversation_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// Finite, non-restartable stream of snapshots. A mid-stream failure is yielded as one `Err` item.
pub type FeedStream = BoxStream<'static, Result<Snapshot>>;

/// Streaming chat backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Starts a response to `query`. Empty `conversation_id` / `last_message_id` start a new conversation.
    ///
    /// Fails with [`RelayError::Producer`](crate::RelayError::Producer) before yielding anything when the
    /// request cannot be started. Dropping the returned stream abandons the request.
    async fn send_message(
        &self,
        query: &str,
        conversation_id: &str,
        last_message_id: &str,
    ) -> Result<FeedStream>;
}
