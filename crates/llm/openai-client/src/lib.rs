//! # OpenAI chat backend
//!
//! [`OpenAIClient`] implements [`relay_core::ChatBackend`] on top of [async-openai] streaming chat
//! completions. Each content delta becomes a [`Snapshot`] carrying the full text so far.
//!
//! Conversations are threaded in memory: every turn is stored under its conversation id with
//! entry ids (a UUID for the user turn, the completion id for the assistant turn). The
//! `last_message_id` of a request picks where in that thread the new turn continues; see
//! [`thread_history`].

use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionResponseStream, CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, error::OpenAIError, Client};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use relay_core::{ChatBackend, FeedStream, RelayError, Snapshot};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Masks an API key/token for safe logging: first 7 chars + "***" + last 4 chars.
/// If length <= 11 chars, returns "***" to avoid leaking any part of the key.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let len = chars.len();
    if len <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{}***{}", head, tail)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One stored turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
        }
    }
}

/// Returns the part of `history` a new turn continues from.
///
/// - empty `last_message_id`: nothing (start over);
/// - known id: everything up to and including that entry (older replies fork the thread);
/// - unknown id: the whole history.
pub fn thread_history(history: &[HistoryEntry], last_message_id: &str) -> Vec<HistoryEntry> {
    if last_message_id.is_empty() {
        return Vec::new();
    }
    match history.iter().position(|e| e.id == last_message_id) {
        Some(i) => history[..=i].to_vec(),
        None => history.to_vec(),
    }
}

type Conversations = Arc<DashMap<String, Vec<HistoryEntry>>>;

/// OpenAI chat backend. Cheap to clone; clones share the conversation store.
#[derive(Clone)]
pub struct OpenAIClient {
    client: Arc<Client<OpenAIConfig>>,
    /// API key stored only for logging (masked).
    api_key_for_logging: String,
    model: String,
    system_prompt: Option<String>,
    conversations: Conversations,
}

impl OpenAIClient {
    /// Builds a client using the given API key and default API base URL.
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.clone());
        Self::from_parts(Client::with_config(config), api_key)
    }

    /// Builds a client with a custom base URL (e.g. for proxies or compatible endpoints).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.clone())
            .with_api_base(base_url);
        Self::from_parts(Client::with_config(config), api_key)
    }

    fn from_parts(client: Client<OpenAIConfig>, api_key_for_logging: String) -> Self {
        Self {
            client: Arc::new(client),
            api_key_for_logging,
            model: DEFAULT_MODEL.to_string(),
            system_prompt: None,
            conversations: Arc::new(DashMap::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt_opt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stored turns of a conversation (empty when unknown).
    pub fn history(&self, conversation_id: &str) -> Vec<HistoryEntry> {
        self.conversations
            .get(conversation_id)
            .map(|h| h.value().clone())
            .unwrap_or_default()
    }

    fn masked_key(&self) -> String {
        mask_token(&self.api_key_for_logging)
    }

    /// System prompt (if any), then the thread, then the new user query.
    pub(crate) fn build_messages(
        &self,
        thread: &[HistoryEntry],
        query: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let mut messages = Vec::with_capacity(thread.len() + 2);
        if let Some(ref prompt) = self.system_prompt {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(prompt.clone())
                    .build()?
                    .into(),
            );
        }
        for entry in thread {
            let msg: ChatCompletionRequestMessage = match entry.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(entry.content.clone())
                    .build()?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(entry.content.clone())
                    .build()?
                    .into(),
            };
            messages.push(msg);
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(query.to_string())
                .build()?
                .into(),
        );
        Ok(messages)
    }
}

fn producer_error(e: OpenAIError) -> RelayError {
    RelayError::Producer(e.to_string())
}

/// A turn that becomes part of the conversation only once its stream completes.
struct PendingTurn {
    conversation_id: String,
    thread: Vec<HistoryEntry>,
    user: HistoryEntry,
}

impl PendingTurn {
    fn commit(self, conversations: &DashMap<String, Vec<HistoryEntry>>, message_id: String, reply: String) {
        let mut history = self.thread;
        history.push(self.user);
        history.push(HistoryEntry::new(message_id, Role::Assistant, reply));
        conversations.insert(self.conversation_id, history);
    }
}

#[async_trait]
impl ChatBackend for OpenAIClient {
    #[instrument(skip(self, query), fields(model = %self.model))]
    async fn send_message(
        &self,
        query: &str,
        conversation_id: &str,
        last_message_id: &str,
    ) -> relay_core::Result<FeedStream> {
        let conversation_id = if conversation_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            conversation_id.to_string()
        };
        let thread = self
            .conversations
            .get(&conversation_id)
            .map(|h| thread_history(h.value(), last_message_id))
            .unwrap_or_default();

        let messages = self.build_messages(&thread, query).map_err(producer_error)?;
        info!(
            conversation_id = %conversation_id,
            thread_len = thread.len(),
            message_count = messages.len(),
            api_key = %self.masked_key(),
            "OpenAI chat stream request"
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .build()
            .map_err(producer_error)?;
        if let Ok(json) = serde_json::to_string(&request) {
            debug!(request_json = %json, "OpenAI chat stream request JSON");
        }

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(producer_error)?;

        let turn = PendingTurn {
            conversation_id,
            thread,
            user: HistoryEntry::new(Uuid::new_v4().to_string(), Role::User, query),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_stream(stream, tx, turn, self.conversations.clone()));

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

/// Forwards accumulated text to the feed until the completion ends, then commits the turn.
/// Stops early (without committing) when the consumer drops the feed.
async fn pump_stream(
    mut stream: ChatCompletionResponseStream,
    tx: mpsc::UnboundedSender<relay_core::Result<Snapshot>>,
    turn: PendingTurn,
    conversations: Conversations,
) {
    let mut text = String::new();
    let mut message_id = String::new();

    while let Some(result) = stream.next().await {
        let chunk = match result {
            Ok(chunk) => chunk,
            Err(e) => {
                error!(error = %e, conversation_id = %turn.conversation_id, "OpenAI stream failed");
                let _ = tx.send(Err(RelayError::Producer(format!("Stream error: {}", e))));
                return;
            }
        };
        if let Some(ref u) = chunk.usage {
            info!(
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                total_tokens = u.total_tokens,
                "OpenAI chat stream usage"
            );
        }
        if message_id.is_empty() {
            message_id = chunk.id.clone();
        }
        let delta = chunk
            .choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .unwrap_or("");
        if delta.is_empty() {
            continue;
        }
        text.push_str(delta);
        let snapshot = Snapshot::new(text.clone(), turn.conversation_id.clone(), message_id.clone());
        if tx.send(Ok(snapshot)).is_err() {
            debug!(conversation_id = %turn.conversation_id, "feed dropped; abandoning completion");
            return;
        }
    }

    if message_id.is_empty() {
        message_id = Uuid::new_v4().to_string();
    }
    info!(
        conversation_id = %turn.conversation_id,
        message_id = %message_id,
        reply_len = text.len(),
        "OpenAI chat stream finished"
    );
    turn.commit(&conversations, message_id, text);
}
