//! # relay-telegram
//!
//! Telegram messaging surface: adapters to core types, [`relay_core::Bot`] implementation
//! (reply, edit, typing), connection config, and the REPL runner that feeds a
//! [`handler_chain::HandlerChain`]. No conversation or streaming logic lives here.

mod adapters;
mod bot_adapter;
mod config;
mod runner;

pub use adapters::{TelegramMessageWrapper, TelegramUserWrapper};
pub use bot_adapter::{parse_message_id, TelegramBotAdapter};
pub use config::TelegramConfig;
pub use runner::{register_commands, run_repl, RELOAD_COMMAND};
