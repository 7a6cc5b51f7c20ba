//! Per-chat backend continuation tokens.
//!
//! One [`ConversationState`] per chat, shared by every feed loop. Writes for a chat only happen
//! from that chat's queue worker (see [`crate::handler`]), so a key never sees interleaved
//! writers even though the map itself is shared.

use dashmap::DashMap;
use relay_core::Snapshot;
use std::sync::Arc;
use tracing::debug;

/// Tokens that let the next trigger resume the backend conversation. Empty means "start new".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub conversation_id: String,
    pub last_message_id: String,
}

impl ConversationState {
    pub fn is_new(&self) -> bool {
        self.conversation_id.is_empty() && self.last_message_id.is_empty()
    }
}

/// Chat id → [`ConversationState`]. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    states: Arc<DashMap<i64, ConversationState>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for `chat_id`; empty when the chat has none yet.
    pub fn get(&self, chat_id: i64) -> ConversationState {
        self.states
            .get(&chat_id)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }

    /// Replaces the state with the snapshot's continuation tokens.
    pub fn update(&self, chat_id: i64, snapshot: &Snapshot) {
        self.states.insert(
            chat_id,
            ConversationState {
                conversation_id: snapshot.conversation_id.clone(),
                last_message_id: snapshot.message_id.clone(),
            },
        );
    }

    /// Starts over: the next trigger opens a new backend conversation.
    pub fn reset(&self, chat_id: i64) {
        debug!(chat_id, "Conversation reset");
        self.states.insert(chat_id, ConversationState::default());
    }
}
