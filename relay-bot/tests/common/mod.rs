//! Shared fixtures for relay-bot integration tests.

#![allow(dead_code)]

pub mod mock_bot;
pub mod scripted_backend;

use relay_core::{Chat, Message, User};

pub const CHAT_ID: i64 = 1001;
pub const USER_ID: i64 = 42;

/// Incoming message from [`USER_ID`] in chat `chat_id`.
pub fn message(chat_id: i64, chat_type: &str, id: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        user: User {
            id: USER_ID,
            username: Some("alice".to_string()),
            first_name: Some("Alice".to_string()),
            last_name: None,
        },
        chat: Chat {
            id: chat_id,
            chat_type: chat_type.to_string(),
        },
        content: content.to_string(),
        created_at: chrono::Utc::now(),
        reply_to_message_id: None,
        reply_to_message_from_bot: false,
    }
}

/// Private-chat trigger in [`CHAT_ID`].
pub fn trigger(content: &str) -> Message {
    message(CHAT_ID, "private", "7", content)
}
