//! Wraps teloxide::Bot and implements [`relay_core::Bot`]. Production code talks to Telegram; tests substitute another Bot impl.

use async_trait::async_trait;
use relay_core::{Bot as CoreBot, Chat, Message, RelayError, Result};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, ChatId, MessageId, ReplyParameters};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// Parses a transport message id string into Telegram's numeric id.
pub fn parse_message_id(s: &str) -> std::result::Result<i32, String> {
    s.parse()
        .map_err(|_| format!("Invalid Telegram message_id: {:?}", s))
}

/// Thin wrapper around teloxide::Bot that implements relay-core's Bot trait.
#[derive(Clone)]
pub struct TelegramBotAdapter {
    bot: teloxide::Bot,
}

impl TelegramBotAdapter {
    pub fn new(bot: teloxide::Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl CoreBot for TelegramBotAdapter {
    async fn reply_to(&self, message: &Message, text: &str) -> Result<String> {
        let reply_to = parse_message_id(&message.id).map_err(RelayError::Send)?;
        let sent = self
            .bot
            .send_message(ChatId(message.chat.id), text.to_string())
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)))
            .await
            .map_err(|e| RelayError::Send(e.to_string()))?;
        Ok(sent.id.to_string())
    }

    async fn edit_message(&self, chat: &Chat, message_id: &str, text: &str) -> Result<()> {
        let id = parse_message_id(message_id).map_err(RelayError::Edit)?;
        match self
            .bot
            .edit_message_text(ChatId(chat.id), MessageId(id), text.to_string())
            .await
        {
            Ok(_) => Ok(()),
            // Same text as already shown; the remote state is what we wanted.
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                debug!(chat_id = chat.id, message_id = %message_id, "edit skipped: message is not modified");
                Ok(())
            }
            Err(e) => Err(RelayError::Edit(e.to_string())),
        }
    }

    async fn send_typing(&self, chat: &Chat) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat.id), ChatAction::Typing)
            .await
            .map_err(|e| RelayError::Liveness(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_id_valid() {
        assert_eq!(parse_message_id("123").unwrap(), 123);
        assert_eq!(parse_message_id("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_message_id_invalid() {
        assert!(parse_message_id("").is_err());
        assert!(parse_message_id("abc").is_err());
        assert!(parse_message_id("12.3").is_err());
    }

    #[tokio::test]
    async fn test_reply_to_rejects_non_numeric_trigger_id() {
        let adapter = TelegramBotAdapter::new(teloxide::Bot::new("dummy_token"));
        let message = Message {
            id: "not-a-number".to_string(),
            user: relay_core::User {
                id: 1,
                username: None,
                first_name: None,
                last_name: None,
            },
            chat: Chat {
                id: 1,
                chat_type: "private".to_string(),
            },
            content: "hi".to_string(),
            created_at: chrono::Utc::now(),
            reply_to_message_id: None,
            reply_to_message_from_bot: false,
        };

        let err = adapter.reply_to(&message, "hello").await.unwrap_err();
        assert!(matches!(err, RelayError::Send(_)));
    }
}
