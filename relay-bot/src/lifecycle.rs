//! Lifecycle of the one reply message a stream writes to.
//!
//! ```text
//! Uncommitted --first snapshot--> Committed(id) --stream closed--> Finalized
//!      \______________________stream closed (no snapshots)_________/
//! ```
//!
//! Before an id exists the only allowed call is `reply_to` (create); afterwards only edits.
//! Every observed snapshot also advances the chat's [`ConversationStore`] tokens.

use crate::conversation::ConversationStore;
use relay_core::{Bot, Chat, Message, RelayError, Result, Snapshot};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Uncommitted,
    Committed { message_id: String },
    Finalized,
}

/// Text most recently confirmed by the messaging surface. Shared with the edit debounce.
#[derive(Debug, Clone, Default)]
pub struct SentText(Arc<Mutex<String>>);

impl SentText {
    pub async fn get(&self) -> String {
        self.0.lock().await.clone()
    }

    pub async fn set(&self, text: &str) {
        let mut guard = self.0.lock().await;
        guard.clear();
        guard.push_str(text);
    }
}

/// Edits `message_id` and records the text on success. Failures are returned for the caller to log.
pub async fn edit_and_record(
    bot: &dyn Bot,
    chat: &Chat,
    message_id: &str,
    text: &str,
    sent: &SentText,
) -> Result<()> {
    bot.edit_message(chat, message_id, text).await?;
    sent.set(text).await;
    Ok(())
}

/// How a finished stream left the reply message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalization {
    /// No snapshot arrived; nothing was created.
    NothingSent,
    /// Final text edited in.
    Flushed { message_id: String, text: String },
    /// The final edit failed; the message shows `last_sent`.
    FlushFailed {
        message_id: String,
        last_sent: String,
        error: String,
    },
}

/// Tracks the reply message of one stream and the chat's continuation tokens.
pub struct MessageLifecycle {
    chat: Chat,
    store: ConversationStore,
    state: LifecycleState,
    latest_text: String,
    sent: SentText,
}

impl MessageLifecycle {
    pub fn new(chat: Chat, store: ConversationStore) -> Self {
        Self {
            chat,
            store,
            state: LifecycleState::Uncommitted,
            latest_text: String::new(),
            sent: SentText::default(),
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn message_id(&self) -> Option<&str> {
        match self.state {
            LifecycleState::Committed { ref message_id } => Some(message_id),
            _ => None,
        }
    }

    pub fn latest_text(&self) -> &str {
        &self.latest_text
    }

    pub fn sent_text(&self) -> SentText {
        self.sent.clone()
    }

    /// Records the normalized text of a snapshot and advances the chat's tokens.
    pub fn observe(&mut self, snapshot: &Snapshot, text: String) {
        self.store.update(self.chat.id, snapshot);
        self.latest_text = text;
    }

    /// Creates the reply message with the latest text. Only valid while uncommitted.
    pub async fn commit(&mut self, bot: &dyn Bot, trigger: &Message) -> Result<String> {
        if self.state != LifecycleState::Uncommitted {
            return Err(RelayError::InvalidState(format!(
                "reply already created for chat {}",
                self.chat.id
            )));
        }
        let message_id = bot.reply_to(trigger, &self.latest_text).await?;
        self.sent.set(&self.latest_text).await;
        info!(
            chat_id = self.chat.id,
            message_id = %message_id,
            text_len = self.latest_text.len(),
            "Reply created"
        );
        self.state = LifecycleState::Committed {
            message_id: message_id.clone(),
        };
        Ok(message_id)
    }

    /// Terminal flush: one direct edit with the latest text, then `Finalized`.
    ///
    /// Uncommitted streams make no call. The caller must have stopped the edit debounce first so
    /// no older edit can land after this one.
    pub async fn finalize(&mut self, bot: &dyn Bot) -> Finalization {
        let state = std::mem::replace(&mut self.state, LifecycleState::Finalized);
        let message_id = match state {
            LifecycleState::Committed { message_id } => message_id,
            LifecycleState::Uncommitted | LifecycleState::Finalized => {
                debug!(chat_id = self.chat.id, "Nothing to finalize");
                return Finalization::NothingSent;
            }
        };
        match edit_and_record(bot, &self.chat, &message_id, &self.latest_text, &self.sent).await {
            Ok(()) => {
                info!(
                    chat_id = self.chat.id,
                    message_id = %message_id,
                    text_len = self.latest_text.len(),
                    "Final edit applied"
                );
                Finalization::Flushed {
                    message_id,
                    text: self.latest_text.clone(),
                }
            }
            Err(e) => {
                warn!(error = %e, chat_id = self.chat.id, message_id = %message_id, "Couldn't perform final edit");
                Finalization::FlushFailed {
                    message_id,
                    last_sent: self.sent.get().await,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Ends the lifecycle without touching the remote message.
    pub fn abandon(&mut self) {
        self.state = LifecycleState::Finalized;
    }
}
