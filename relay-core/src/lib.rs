//! # relay-core
//!
//! Core types and traits for the streaming chat relay: [`Bot`] (messaging surface), [`ChatBackend`]
//! (snapshot feed), [`Handler`], message and user types, errors, and tracing initialization.
//! Transport-agnostic; used by relay-telegram, handler-chain, openai-client and relay-bot.

pub mod bot;
pub mod error;
pub mod feed;
pub mod logger;
pub mod types;

pub use bot::Bot;
pub use error::{HandlerError, RelayError, Result};
pub use feed::{ChatBackend, FeedStream, Snapshot};
pub use logger::init_tracing;
pub use types::{Chat, Handler, HandlerResponse, Message, ToCoreMessage, ToCoreUser, User};
