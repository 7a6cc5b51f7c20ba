//! Feed consumer loop: turns one backend snapshot stream into a reply message that is created
//! once, edited at most every `edit_interval`, and flushed with the final text when the stream
//! closes.
//!
//! **Data flow:** typing ping → for each snapshot: normalize → create reply (first) or debounce an
//! edit (later) → debounce a typing refresh → on close: stop both debounces → final edit.

use crate::conversation::ConversationStore;
use crate::lifecycle::{edit_and_record, Finalization, MessageLifecycle};
use crate::markdown::ensure_formatting;
use futures::StreamExt;
use ratelimit::{Debounce, DebounceWithArgs};
use relay_core::{Bot, Chat, FeedStream, Message, RelayError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_EDIT_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_secs(10);

/// Debounce delays for one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedSettings {
    /// Content debounce delay: the minimum quiet time before an edit goes out.
    pub edit_interval: Duration,
    /// Liveness debounce delay: typing is refreshed this long after the latest snapshot.
    pub typing_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            edit_interval: DEFAULT_EDIT_INTERVAL,
            typing_interval: DEFAULT_TYPING_INTERVAL,
        }
    }
}

/// How a loop ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Stream closed; see [`Finalization`] for what the reply shows.
    Completed(Finalization),
    /// Cancelled before the stream closed. Pending edits were dropped and no final edit was made.
    Cancelled,
}

enum Closed {
    Exhausted,
    Failed(RelayError),
    Cancelled,
}

async fn send_typing(bot: &dyn Bot, chat: &Chat) {
    if let Err(e) = bot.send_typing(chat).await {
        warn!(error = %e, chat_id = chat.id, "Couldn't start typing");
    }
}

/// Consumes `feed` for the reply to `trigger`.
///
/// - Blank snapshots before the reply exists are recorded but do not create it.
/// - Create failure: returns the `Send` error at once; nothing else is sent.
/// - Edit/typing failures: logged; the loop continues.
/// - Mid-stream backend failure: the final edit still runs, then the `Producer` error is returned.
/// - `cancel` fired: returns [`FeedOutcome::Cancelled`] without a final edit.
#[instrument(skip_all, fields(chat_id = trigger.chat.id, trigger_id = %trigger.id))]
pub async fn run_feed_loop(
    bot: Arc<dyn Bot>,
    trigger: &Message,
    mut feed: FeedStream,
    store: &ConversationStore,
    settings: FeedSettings,
    cancel: &CancellationToken,
) -> Result<FeedOutcome> {
    let chat = trigger.chat.clone();
    send_typing(bot.as_ref(), &chat).await;

    let typing = {
        let bot = bot.clone();
        let chat = chat.clone();
        Debounce::with_cancellation(settings.typing_interval, cancel.clone(), move || {
            let bot = bot.clone();
            let chat = chat.clone();
            async move { send_typing(bot.as_ref(), &chat).await }
        })
    };

    let mut lifecycle = MessageLifecycle::new(chat.clone(), store.clone());

    let edits = {
        let bot = bot.clone();
        let chat = chat.clone();
        let sent = lifecycle.sent_text();
        DebounceWithArgs::with_cancellation(
            settings.edit_interval,
            cancel.clone(),
            move |(message_id, text): (String, String)| {
                let bot = bot.clone();
                let chat = chat.clone();
                let sent = sent.clone();
                async move {
                    match edit_and_record(bot.as_ref(), &chat, &message_id, &text, &sent).await {
                        Ok(()) => debug!(chat_id = chat.id, message_id = %message_id, text_len = text.len(), "Edit applied"),
                        Err(e) => warn!(error = %e, chat_id = chat.id, message_id = %message_id, "Couldn't edit message"),
                    }
                }
            },
        )
    };

    let mut snapshots = 0usize;
    let closed = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Closed::Cancelled,
            next = feed.next() => next,
        };
        let snapshot = match next {
            None => break Closed::Exhausted,
            Some(Err(e)) => break Closed::Failed(e),
            Some(Ok(snapshot)) => snapshot,
        };
        snapshots += 1;

        lifecycle.observe(&snapshot, ensure_formatting(&snapshot.text));
        if let Some(message_id) = lifecycle.message_id().map(str::to_string) {
            edits.call((message_id, lifecycle.latest_text().to_string()));
        } else if lifecycle.latest_text().trim().is_empty() {
            // Telegram rejects blank text; the reply is created by the first visible snapshot.
            debug!(snapshots, "Blank snapshot; deferring reply");
        } else if let Err(e) = lifecycle.commit(bot.as_ref(), trigger).await {
            error!(error = %e, "Couldn't send reply; abandoning stream");
            typing.stop().await;
            edits.stop().await;
            lifecycle.abandon();
            return Err(e);
        }
        typing.call();
    };

    // Waits for an in-flight edit, so the final edit below is the last one observed.
    typing.stop().await;
    edits.stop().await;

    match closed {
        Closed::Cancelled => {
            info!(snapshots, "Stream cancelled; skipping final edit");
            lifecycle.abandon();
            Ok(FeedOutcome::Cancelled)
        }
        Closed::Exhausted => {
            let finalization = lifecycle.finalize(bot.as_ref()).await;
            info!(snapshots, ?finalization, "Stream finished");
            Ok(FeedOutcome::Completed(finalization))
        }
        Closed::Failed(e) => {
            error!(error = %e, snapshots, "Stream failed");
            lifecycle.finalize(bot.as_ref()).await;
            Err(e)
        }
    }
}
