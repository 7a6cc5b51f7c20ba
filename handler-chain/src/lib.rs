//! # Handler chain
//!
//! Runs the relay's handlers for each incoming message: every `before` in order (any `false`
//! stops the chain), then `handle` until one returns Stop or Reply, then every `after` in reverse.
//!
//! A failing `handle` is logged and ends the handle phase with Stop; the `after` hooks still run so
//! the chain always observes a final response.

use relay_core::{Handler, HandlerResponse, Message, Result};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Ordered list of handlers sharing one message.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler.
    pub fn add_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Runs the three phases for `message` and returns the final response.
    #[instrument(skip(self, message), fields(chat_id = message.chat.id, user_id = message.user.id))]
    pub async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        debug!(message_id = %message.id, handlers = self.handlers.len(), "chain started");

        for h in &self.handlers {
            if !h.before(message).await? {
                info!(
                    handler = %std::any::type_name_of_val(h.as_ref()),
                    "before returned false, chain stopped"
                );
                return Ok(HandlerResponse::Stop);
            }
        }

        let mut final_response = HandlerResponse::Continue;
        for h in &self.handlers {
            let name = std::any::type_name_of_val(h.as_ref());
            match h.handle(message).await {
                Ok(HandlerResponse::Continue) | Ok(HandlerResponse::Ignore) => {}
                Ok(response) => {
                    debug!(handler = %name, response = ?response, "handle phase ended");
                    final_response = response;
                    break;
                }
                Err(e) => {
                    error!(handler = %name, error = %e, "handler failed");
                    final_response = HandlerResponse::Stop;
                    break;
                }
            }
        }

        for h in self.handlers.iter().rev() {
            h.after(message, &final_response).await?;
        }

        debug!(message_id = %message.id, response = ?final_response, "chain finished");
        Ok(final_response)
    }
}

/// Logs each incoming message in `before` and the final response in `after`; never stops the chain.
pub struct LoggingHandler;

#[async_trait::async_trait]
impl Handler for LoggingHandler {
    async fn before(&self, message: &Message) -> Result<bool> {
        info!(
            user_id = message.user.id,
            chat_id = message.chat.id,
            username = %message.user.username.as_deref().unwrap_or("unknown"),
            content_len = message.content.len(),
            "Received message"
        );
        Ok(true)
    }

    async fn after(&self, message: &Message, response: &HandlerResponse) -> Result<()> {
        debug!(message_id = %message.id, response = ?response, "Processed message");
        Ok(())
    }
}

// Integration tests live in tests/handler_chain_test.rs
