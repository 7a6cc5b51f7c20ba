//! Relay handler: routes triggers and `/reload` for each chat through one serializing queue.
//!
//! **Data flow:** `Handler::handle` → command / trigger detection → allow-list → enqueue per chat →
//! `process_queue_loop` → `process_job` (start backend stream → [`run_feed_loop`]).
//!
//! One worker task per chat owns that chat's [`ConversationStore`] entry while it runs, so a new
//! trigger for the same chat waits until the previous stream has finished and stored its tokens.
//! Different chats are processed concurrently.

use crate::auth::AllowList;
use crate::conversation::ConversationStore;
use crate::feed::{run_feed_loop, FeedOutcome, FeedSettings};
use crate::mention;
use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::{
    Bot, ChatBackend, Handler, HandlerError, HandlerResponse, Message, RelayError, Result,
};
pub use relay_telegram::RELOAD_COMMAND;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const MSG_UNAUTHORIZED: &str = "You are not authorized to use this bot.";
pub const MSG_RELOADED: &str = "Started a new conversation. Enjoy!";
const MSG_START_FAILED_PREFIX: &str = "Couldn't send message";
const MSG_STREAM_FAILED_PREFIX: &str = "The response was interrupted";
const MSG_REPLY_FAILED_PREFIX: &str = "Couldn't send the reply";

/// Work for a chat's queue.
#[derive(Debug)]
enum Job {
    Ask { message: Message, query: String },
    Reset { message: Message },
}

type JobSender = mpsc::UnboundedSender<Job>;

/// Collaborators shared by every chat worker.
struct Relay {
    bot: Arc<dyn Bot>,
    backend: Arc<dyn ChatBackend>,
    store: ConversationStore,
    settings: FeedSettings,
}

/// Handler that relays backend streams as Telegram replies, one queue per chat.
pub struct RelayHandler {
    relay: Arc<Relay>,
    allow_list: AllowList,
    bot_username: Arc<RwLock<Option<String>>>,
    shutdown: CancellationToken,
    queues: DashMap<i64, JobSender>,
}

impl RelayHandler {
    pub fn new(
        bot: Arc<dyn Bot>,
        backend: Arc<dyn ChatBackend>,
        store: ConversationStore,
        settings: FeedSettings,
        allow_list: AllowList,
        bot_username: Arc<RwLock<Option<String>>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            relay: Arc::new(Relay {
                bot,
                backend,
                store,
                settings,
            }),
            allow_list,
            bot_username,
            shutdown,
            queues: DashMap::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.relay.store
    }

    /// Number of chats that currently have a worker.
    pub fn active_chats(&self) -> usize {
        self.queues.len()
    }

    fn classify(&self, message: &Message, bot_username: Option<&str>) -> Option<Job> {
        if mention::is_command(&message.content, RELOAD_COMMAND, bot_username) {
            return Some(Job::Reset {
                message: message.clone(),
            });
        }
        mention::get_query(message, bot_username).map(|query| Job::Ask {
            message: message.clone(),
            query,
        })
    }

    fn enqueue(&self, chat_id: i64, job: Job) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(HandlerError::QueueClosed(chat_id).into());
        }
        let job = {
            let sender = self
                .queues
                .entry(chat_id)
                .or_insert_with(|| self.spawn_worker(chat_id));
            match sender.send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(job)) => job,
            }
        };
        // Worker gone (shutdown); drop the stale queue so a later message can start a fresh one.
        self.queues.remove(&chat_id);
        if self.shutdown.is_cancelled() {
            return Err(HandlerError::QueueClosed(chat_id).into());
        }
        let sender = self.spawn_worker(chat_id);
        sender
            .send(job)
            .map_err(|_| RelayError::from(HandlerError::QueueClosed(chat_id)))?;
        self.queues.insert(chat_id, sender);
        Ok(())
    }

    fn spawn_worker(&self, chat_id: i64) -> JobSender {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(process_queue_loop(
            rx,
            self.relay.clone(),
            chat_id,
            self.shutdown.child_token(),
        ));
        debug!(chat_id, "Chat worker started");
        tx
    }
}

/// Runs jobs for one chat in arrival order until shutdown or until the handler is dropped.
async fn process_queue_loop(
    mut rx: mpsc::UnboundedReceiver<Job>,
    relay: Arc<Relay>,
    chat_id: i64,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        process_job(&relay, job, &shutdown).await;
    }
    debug!(chat_id, "Chat worker stopped");
}

async fn process_job(relay: &Relay, job: Job, shutdown: &CancellationToken) {
    match job {
        Job::Reset { message } => {
            relay.store.reset(message.chat.id);
            info!(chat_id = message.chat.id, user_id = message.user.id, "Started a new conversation");
            if let Err(e) = relay.bot.reply_to(&message, MSG_RELOADED).await {
                error!(error = %e, "Couldn't send message");
            }
        }
        Job::Ask { message, query } => ask(relay, &message, &query, shutdown).await,
    }
}

async fn ask(relay: &Relay, message: &Message, query: &str, shutdown: &CancellationToken) {
    let chat_id = message.chat.id;
    let state = relay.store.get(chat_id);
    info!(
        chat_id,
        user_id = message.user.id,
        conversation_id = %state.conversation_id,
        new_conversation = state.is_new(),
        query_len = query.len(),
        "Starting backend stream"
    );

    let feed = match relay
        .backend
        .send_message(query, &state.conversation_id, &state.last_message_id)
        .await
    {
        Ok(feed) => feed,
        Err(e) => {
            error!(error = %e, chat_id, "Couldn't start backend stream");
            notify(relay, message, &format!("{}: {}", MSG_START_FAILED_PREFIX, e)).await;
            return;
        }
    };

    match run_feed_loop(
        relay.bot.clone(),
        message,
        feed,
        &relay.store,
        relay.settings,
        shutdown,
    )
    .await
    {
        Ok(FeedOutcome::Completed(_)) => {}
        Ok(FeedOutcome::Cancelled) => info!(chat_id, "Stream cancelled by shutdown"),
        Err(e @ RelayError::Producer(_)) => {
            notify(relay, message, &format!("{}: {}", MSG_STREAM_FAILED_PREFIX, e)).await;
        }
        Err(e @ RelayError::Send(_)) => {
            error!(error = %e, chat_id, "Couldn't create reply");
            notify(relay, message, &format!("{}: {}", MSG_REPLY_FAILED_PREFIX, e)).await;
        }
        Err(e) => error!(error = %e, chat_id, "Feed loop failed"),
    }
}

async fn notify(relay: &Relay, message: &Message, text: &str) {
    if let Err(e) = relay.bot.reply_to(message, text).await {
        error!(error = %e, chat_id = message.chat.id, "Couldn't send message");
    }
}

#[async_trait]
impl Handler for RelayHandler {
    #[instrument(skip(self, message), fields(chat_id = message.chat.id, user_id = message.user.id))]
    async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        let bot_username = self.bot_username.read().await.clone();
        let Some(job) = self.classify(message, bot_username.as_deref()) else {
            debug!("Message not addressed to the bot");
            return Ok(HandlerResponse::Continue);
        };

        if !self.allow_list.can_interact(&message.user) {
            if let Err(e) = self.relay.bot.reply_to(message, MSG_UNAUTHORIZED).await {
                error!(error = %e, "Couldn't send message");
            }
            return Ok(HandlerResponse::Reply(MSG_UNAUTHORIZED.to_string()));
        }

        if let Err(e) = self.enqueue(message.chat.id, job) {
            warn!(error = %e, "Couldn't queue message");
            return Err(e);
        }
        Ok(HandlerResponse::Stop)
    }
}
