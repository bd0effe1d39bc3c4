//! Conversational recommendations over the search engine.
//!
//! A turn runs semantic retrieval, carries over products the assistant cited
//! in recent turns when the query reads as a follow-up, then asks the chat
//! model for an answer, either whole or as a stream of [`ChatEvent`]s.

pub mod context;
pub mod prompt;

use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::ChatMessage;
use crate::search::SearchEngine;

pub const NOT_CONFIGURED_REPLY: &str = "AI chat is not available. Please configure an API key.";
pub const NO_PRODUCTS_REPLY: &str =
    "I couldn't find any products matching your query. Could you try rephrasing or being more specific?";
pub const ERROR_REPLY: &str = "I encountered an error processing your request. Please try again.";

/// One frame of a streamed chat answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatEvent {
    Start,
    Content { text: String },
    Done,
    Error { message: String },
}

/// Outcome of preparing a turn: either model input or a canned reply.
enum Prepared {
    Messages(Vec<ChatMessage>),
    Reply(&'static str),
}

pub struct ChatService {
    engine: Arc<SearchEngine>,
    configured: bool,
}

impl ChatService {
    /// `configured` is false when no generative provider credentials exist.
    pub fn new(engine: Arc<SearchEngine>, configured: bool) -> Self {
        Self { engine, configured }
    }

    /// Whole answer. Never fails; failures become apology text.
    pub async fn respond(&self, query: &str, history: &[ChatMessage]) -> String {
        let messages = match self.prepare(query, history).await {
            Ok(Prepared::Messages(messages)) => messages,
            Ok(Prepared::Reply(reply)) => return reply.to_string(),
            Err(e) => {
                tracing::error!("Chat error: {e}");
                return ERROR_REPLY.to_string();
            }
        };

        let max_tokens = self.engine.config().chat_max_tokens;
        self.engine
            .chat_provider()
            .complete(&messages, max_tokens)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Chat error: {e}");
                ERROR_REPLY.to_string()
            })
    }

    /// Streamed answer. A spawned producer pushes events into a one-slot
    /// channel: `Start`, then `Content` fragments, then `Done`, or `Error` if
    /// the provider fails mid-answer. The producer runs to completion even
    /// after the receiver is dropped.
    pub fn stream(self: &Arc<Self>, query: String, history: Vec<ChatMessage>) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(1);
        let service = Arc::clone(self);

        tokio::spawn(async move {
            let mut open = tx.send(ChatEvent::Start).await.is_ok();

            let messages = match service.prepare(&query, &history).await {
                Ok(Prepared::Messages(messages)) => Some(messages),
                Ok(Prepared::Reply(reply)) => {
                    emit(&tx, &mut open, ChatEvent::Content { text: reply.to_string() }).await;
                    None
                }
                Err(e) => {
                    tracing::error!("Stream chat error: {e}");
                    emit(&tx, &mut open, ChatEvent::Content { text: ERROR_REPLY.to_string() }).await;
                    None
                }
            };

            if let Some(messages) = messages {
                let max_tokens = service.engine.config().stream_max_tokens;
                match service.engine.chat_provider().stream(messages, max_tokens).await {
                    Ok(mut fragments) => {
                        while let Some(fragment) = fragments.next().await {
                            match fragment {
                                Ok(text) => emit(&tx, &mut open, ChatEvent::Content { text }).await,
                                Err(e) => {
                                    tracing::error!("Stream chat error: {e}");
                                    let message = ERROR_REPLY.to_string();
                                    emit(&tx, &mut open, ChatEvent::Error { message }).await;
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Stream chat error: {e}");
                        emit(&tx, &mut open, ChatEvent::Content { text: ERROR_REPLY.to_string() }).await;
                    }
                }
            }

            emit(&tx, &mut open, ChatEvent::Done).await;
        });

        rx
    }

    async fn prepare(&self, query: &str, history: &[ChatMessage]) -> Result<Prepared> {
        if !self.configured {
            return Ok(Prepared::Reply(NOT_CONFIGURED_REPLY));
        }

        let max_products = self.engine.config().chat_max_products;
        let fresh = self.engine.semantic_search(query, None, max_products).await?;
        let products =
            context::merge_context(self.engine.catalog(), query, history, fresh, max_products);
        if products.is_empty() {
            return Ok(Prepared::Reply(NO_PRODUCTS_REPLY));
        }

        let history = prompt::sanitize_history(history);
        Ok(Prepared::Messages(prompt::build_messages(query, &products, &history)))
    }
}

/// Send while the consumer is listening; afterwards drop events silently.
async fn emit(tx: &mpsc::Sender<ChatEvent>, open: &mut bool, event: ChatEvent) {
    if *open && tx.send(event).await.is_err() {
        tracing::debug!("Chat client went away; draining provider stream");
        *open = false;
    }
}
