//! REPL runner: converts teloxide messages to core::Message and passes them to the HandlerChain.
//! Resolves the bot username before starting so handlers can detect @mentions.

use std::sync::Arc;

use handler_chain::HandlerChain;
use relay_core::ToCoreMessage;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::adapters::TelegramMessageWrapper;

/// Command that starts a new backend conversation in the current chat.
pub const RELOAD_COMMAND: &str = "reload";

/// Registers the bot's commands with Telegram so clients can suggest them.
pub async fn register_commands(bot: &teloxide::Bot) -> anyhow::Result<()> {
    bot.set_my_commands(vec![BotCommand::new(
        RELOAD_COMMAND,
        "Start a new conversation.",
    )])
    .await?;
    Ok(())
}

/// Starts the REPL with the given teloxide Bot and HandlerChain.
///
/// Writes the bot username into `bot_username` before the first update. Each text message is
/// converted and handed to the chain inline; the relay handler only queues work, so polling is
/// not held up by streams. When the REPL exits (Ctrl-C),
/// `shutdown` is cancelled so queued conversations and in-flight streams stop too.
#[instrument(skip(bot, handler_chain, bot_username, shutdown))]
pub async fn run_repl(
    bot: teloxide::Bot,
    handler_chain: HandlerChain,
    bot_username: Arc<tokio::sync::RwLock<Option<String>>>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    match bot.get_me().await {
        Ok(me) => {
            if let Some(username) = &me.user.username {
                *bot_username.write().await = Some(username.clone());
                info!(username = %username, "Bot username set before repl");
            }
        }
        Err(e) => warn!(error = %e, "get_me failed; @mentions will not be detected"),
    }

    if let Err(e) = register_commands(&bot).await {
        error!(error = %e, "Couldn't register commands");
    }

    let chain = handler_chain;
    teloxide::repl(bot, move |msg: teloxide::types::Message| {
        let chain = chain.clone();
        async move {
            if msg.text().is_none() {
                debug!(chat_id = msg.chat.id.0, "Ignoring non-text message");
                return respond(());
            }
            let core_msg = TelegramMessageWrapper(&msg).to_core();
            info!(
                user_id = core_msg.user.id,
                chat_id = core_msg.chat.id,
                message_id = %core_msg.id,
                "Received message"
            );

            // Inline, so updates of one chat reach the chain in arrival order.
            if let Err(e) = chain.handle(&core_msg).await {
                error!(error = %e, user_id = core_msg.user.id, "Handler chain failed");
            }

            respond(())
        }
    })
    .await;

    info!("REPL stopped; shutting down conversations");
    shutdown.cancel();
    Ok(())
}
