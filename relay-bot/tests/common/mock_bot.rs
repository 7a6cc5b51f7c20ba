//! Mock implementation of [`relay_core::Bot`] for integration tests.
//!
//! Records every call with the virtual time it was made at (tests run with the tokio clock
//! paused), so timing of creates, edits and typing pings can be asserted exactly.

use async_trait::async_trait;
use relay_core::{Bot, Chat, Message, RelayError, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Reply { reply_to: String, text: String },
    Edit { message_id: String, text: String },
    Typing,
}

#[derive(Debug, Clone)]
pub struct Recorded {
    /// Time since the mock was created.
    pub at: Duration,
    pub call: Call,
}

/// Mock Bot. Reply ids count up from 100. Each call kind can be made to fail.
///
/// Like Telegram, replies with blank text are rejected.
pub struct MockBot {
    start: Instant,
    calls: Mutex<Vec<Recorded>>,
    next_id: AtomicU64,
    /// Number of upcoming replies that fail.
    failing_replies: AtomicUsize,
    fail_edit: AtomicBool,
    fail_typing: AtomicBool,
    edit_delay: Duration,
}

impl MockBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(Duration::ZERO))
    }

    /// Edits take `edit_delay` of virtual time to complete.
    pub fn with_edit_delay(edit_delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(edit_delay))
    }

    fn build(edit_delay: Duration) -> Self {
        Self {
            start: Instant::now(),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(100),
            failing_replies: AtomicUsize::new(0),
            fail_edit: AtomicBool::new(false),
            fail_typing: AtomicBool::new(false),
            edit_delay,
        }
    }

    pub fn fail_replies(&self) {
        self.failing_replies.store(usize::MAX, Ordering::SeqCst);
    }

    /// Only the next reply fails; later ones (e.g. a failure notice) go through.
    pub fn fail_next_reply(&self) {
        self.failing_replies.store(1, Ordering::SeqCst);
    }

    pub fn fail_edits(&self) {
        self.fail_edit.store(true, Ordering::SeqCst);
    }

    pub fn fail_typing(&self) {
        self.fail_typing.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        let at = Instant::now() - self.start;
        self.calls.lock().unwrap().push(Recorded { at, call });
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    /// Reply texts in order.
    pub fn replies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|r| match r.call {
                Call::Reply { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// `(at, message_id, text)` of every edit attempt in order.
    pub fn edits(&self) -> Vec<(Duration, String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|r| match r.call {
                Call::Edit { message_id, text } => Some((r.at, message_id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn typing_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|r| r.call == Call::Typing)
            .count()
    }
}

#[async_trait]
impl Bot for MockBot {
    async fn reply_to(&self, message: &Message, text: &str) -> Result<String> {
        self.record(Call::Reply {
            reply_to: message.id.clone(),
            text: text.to_string(),
        });
        if text.trim().is_empty() {
            return Err(RelayError::Send("Bad Request: message text is empty".to_string()));
        }
        let failing = self
            .failing_replies
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RelayError::Send("Forbidden: bot was blocked by the user".to_string()));
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    async fn edit_message(&self, _chat: &Chat, message_id: &str, text: &str) -> Result<()> {
        self.record(Call::Edit {
            message_id: message_id.to_string(),
            text: text.to_string(),
        });
        if !self.edit_delay.is_zero() {
            tokio::time::sleep(self.edit_delay).await;
        }
        if self.fail_edit.load(Ordering::SeqCst) {
            return Err(RelayError::Edit("Too Many Requests: retry after 3".to_string()));
        }
        Ok(())
    }

    async fn send_typing(&self, _chat: &Chat) -> Result<()> {
        self.record(Call::Typing);
        if self.fail_typing.load(Ordering::SeqCst) {
            return Err(RelayError::Liveness("network down".to_string()));
        }
        Ok(())
    }
}
