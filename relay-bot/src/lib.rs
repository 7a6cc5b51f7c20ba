//! # relay-bot
//!
//! Relays streamed chat backend replies into Telegram. Each triggering message gets one reply
//! that is created from the first snapshot, edited no more often than the edit interval while
//! the backend streams, and set to the final text when the stream closes.
//!
//! - [`feed`]: the feed consumer loop ([`run_feed_loop`]).
//! - [`lifecycle`]: the reply message state machine.
//! - [`handler`]: per-chat serializing queue, `/reload`, allow-list.
//! - [`config`] / [`runner`]: env config and wiring for the `relay-bot` binary.

pub mod auth;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod feed;
pub mod handler;
pub mod lifecycle;
pub mod markdown;
pub mod mention;
pub mod runner;

pub use auth::AllowList;
pub use config::RelayConfig;
pub use conversation::{ConversationState, ConversationStore};
pub use feed::{run_feed_loop, FeedOutcome, FeedSettings};
pub use handler::{RelayHandler, MSG_RELOADED, MSG_UNAUTHORIZED, RELOAD_COMMAND};
pub use lifecycle::{Finalization, LifecycleState, MessageLifecycle};
pub use markdown::ensure_formatting;
pub use runner::{build_handler_chain, run_bot};
