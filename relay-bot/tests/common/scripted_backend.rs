//! Scripted [`relay_core::ChatBackend`]: each request replays the next script on the tokio clock.

use async_trait::async_trait;
use futures::StreamExt;
use relay_core::{ChatBackend, FeedStream, RelayError, Result, Snapshot};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// One scripted event, timed in milliseconds from the start of the stream.
#[derive(Debug, Clone)]
pub enum Step {
    Yield(u64, Snapshot),
    Fail(u64, String),
    Close(u64),
    /// Never yields again and never closes.
    Hang,
}

/// Snapshot of `text` in conversation `conv-1`, message `msg-<text.len()>`.
pub fn snap(text: &str) -> Snapshot {
    Snapshot::new(text, "conv-1", format!("msg-{}", text.len()))
}

pub fn yield_at(ms: u64, text: &str) -> Step {
    Step::Yield(ms, snap(text))
}

/// Stream that plays `steps` relative to now.
pub fn scripted_feed(steps: Vec<Step>) -> FeedStream {
    let start = Instant::now();
    futures::stream::unfold(steps.into_iter(), move |mut steps| async move {
        match steps.next()? {
            Step::Yield(ms, snapshot) => {
                sleep_until(start + Duration::from_millis(ms)).await;
                Some((Ok(snapshot), steps))
            }
            Step::Fail(ms, msg) => {
                sleep_until(start + Duration::from_millis(ms)).await;
                Some((Err(RelayError::Producer(msg)), steps))
            }
            Step::Close(ms) => {
                sleep_until(start + Duration::from_millis(ms)).await;
                None
            }
            Step::Hang => {
                futures::future::pending::<()>().await;
                None
            }
        }
    })
    .boxed()
}

/// `(query, conversation_id, last_message_id)` of one backend request.
pub type Request = (String, String, String);

/// Backend that answers requests from a queue of scripts; `Err` scripts fail at start.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<std::result::Result<Vec<Step>, String>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, steps: Vec<Step>) {
        self.scripts.lock().unwrap().push_back(Ok(steps));
    }

    pub fn push_start_failure(&self, msg: &str) {
        self.scripts.lock().unwrap().push_back(Err(msg.to_string()));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send_message(
        &self,
        query: &str,
        conversation_id: &str,
        last_message_id: &str,
    ) -> Result<FeedStream> {
        self.requests.lock().unwrap().push((
            query.to_string(),
            conversation_id.to_string(),
            last_message_id.to_string(),
        ));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![Step::Close(0)]));
        match script {
            Ok(steps) => Ok(scripted_feed(steps)),
            Err(msg) => Err(RelayError::Producer(msg)),
        }
    }
}
