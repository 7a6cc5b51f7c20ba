//! Wires config, tracing, the OpenAI backend and the Telegram surface, then runs the REPL.

use crate::config::RelayConfig;
use crate::conversation::ConversationStore;
use crate::handler::RelayHandler;
use anyhow::Result;
use handler_chain::{HandlerChain, LoggingHandler};
use openai_client::OpenAIClient;
use relay_core::{init_tracing, Bot, ChatBackend};
use relay_telegram::{run_repl, TelegramBotAdapter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Builds the chain: logging first, then the relay handler.
pub fn build_handler_chain(handler: Arc<RelayHandler>) -> HandlerChain {
    HandlerChain::new()
        .add_handler(Arc::new(LoggingHandler))
        .add_handler(handler)
}

pub async fn run_bot(config: RelayConfig) -> Result<()> {
    init_tracing(&config.log_file)?;
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e);
    }

    info!(
        model = %config.ai_model,
        base_url = %config.openai_base_url,
        edit_interval_ms = config.edit_interval.as_millis() as u64,
        typing_interval_secs = config.typing_interval.as_secs(),
        allow_list = config.allow_list.len(),
        "Starting relay bot"
    );

    let teloxide_bot = config.telegram.build_bot()?;
    let bot: Arc<dyn Bot> = Arc::new(TelegramBotAdapter::new(teloxide_bot.clone()));
    let backend: Arc<dyn ChatBackend> = Arc::new(
        OpenAIClient::with_base_url(config.openai_api_key.clone(), config.openai_base_url.clone())
            .with_model(config.ai_model.clone())
            .with_system_prompt_opt(config.ai_system_prompt.clone()),
    );

    let bot_username = Arc::new(tokio::sync::RwLock::new(None));
    let shutdown = CancellationToken::new();
    let handler = Arc::new(RelayHandler::new(
        bot,
        backend,
        ConversationStore::new(),
        config.feed_settings(),
        config.allow_list.clone(),
        bot_username.clone(),
        shutdown.clone(),
    ));

    run_repl(teloxide_bot, build_handler_chain(handler), bot_username, shutdown).await
}
