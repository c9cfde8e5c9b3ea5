//! The request/response layer between endpoints and the model provider.
//!
//! [`respond`] snapshots the conversation, runs it through the provider, and
//! commits the assistant's reply back to the store. For streaming responses
//! the commit happens exactly once, after the provider stream completes; a
//! stream that errors commits nothing, so a partial reply is never stored.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use reqwest::Client;

use crate::conversation::ConversationStore;
use crate::error::Error;
use crate::providers::GenerationProvider;

pub mod types;

use types::ChatMessage;

/// A stream of text fragments on the way out of the gateway
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

pub enum ChatOutput {
    NonStreaming(String),
    Streaming(ChatStream),
}

/// Generates a reply to the conversation currently in `store`.
///
/// An empty conversation is a no-op: nothing is sent to the provider and
/// nothing is appended.
pub async fn respond<P: GenerationProvider>(
    store: Arc<ConversationStore>,
    provider: &P,
    client: &Client,
    stream: bool,
) -> Result<ChatOutput, Error> {
    let messages = store.snapshot().await;
    if messages.is_empty() {
        return Ok(if stream {
            ChatOutput::Streaming(Box::pin(futures::stream::empty()))
        } else {
            ChatOutput::NonStreaming(String::new())
        });
    }
    if stream {
        let mut fragments = provider.generate_stream(messages, client).await?;
        let output_stream = async_stream::stream! {
            let mut full_text = String::new();
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    Ok(text) => {
                        full_text.push_str(&text);
                        yield Ok(text);
                    }
                    Err(e) => {
                        // Abort without committing: the store must never hold
                        // a partial assistant turn.
                        yield Err(e);
                        return;
                    }
                }
            }
            store.append(ChatMessage::assistant_text(full_text)).await;
        };
        Ok(ChatOutput::Streaming(Box::pin(output_stream)))
    } else {
        let text = provider.generate(messages, client).await?;
        store
            .append(ChatMessage::assistant_text(text.clone()))
            .await;
        Ok(ChatOutput::NonStreaming(text))
    }
}
