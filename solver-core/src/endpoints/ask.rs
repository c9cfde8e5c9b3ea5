use axum::body::Body;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorDetails};
use crate::gateway_util::{AppState, AppStateData, StructuredJson};
use crate::inference::types::ChatMessage;
use crate::inference::{respond, ChatOutput, ChatStream};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AskParams {
    pub prompt: String,
    pub stream: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
struct AskChunk<'a> {
    text: &'a str,
}

/// A handler for `POST /ask`.
///
/// Appends the prompt as a user message, generates a reply, and returns it
/// either as a single JSON body or as an SSE stream of text fragments
/// terminated by `[DONE]`.
pub async fn ask_handler(
    State(AppStateData {
        http_client,
        conversation,
        provider,
        ..
    }): AppState,
    StructuredJson(params): StructuredJson<AskParams>,
) -> Result<Response<Body>, Error> {
    conversation
        .append(ChatMessage::user_text(params.prompt))
        .await;
    let output = respond(
        conversation.clone(),
        provider.as_ref(),
        &http_client,
        params.stream.unwrap_or(false),
    )
    .await?;
    match output {
        ChatOutput::NonStreaming(text) => Ok(Json(AskResponse { response: text }).into_response()),
        ChatOutput::Streaming(stream) => {
            let event_stream = prepare_serialized_events(stream);
            Ok(Sse::new(event_stream)
                .keep_alive(axum::response::sse::KeepAlive::new())
                .into_response())
        }
    }
}

// Prepares an Event for SSE on the way out of the gateway.
// We send "[DONE]" to the client to signal the end of the stream.
fn prepare_serialized_events(mut stream: ChatStream) -> impl Stream<Item = Result<Event, Error>> {
    async_stream::stream! {
        while let Some(fragment) = stream.next().await {
            let chunk_json = match fragment {
                Ok(text) => serde_json::to_value(AskChunk { text: &text }).map_err(|e| {
                    Error::new(ErrorDetails::Serialization {
                        message: format!("Failed to convert chunk to JSON: {e}"),
                    })
                })?,
                Err(e) => serde_json::json!({"error": e.to_string()}),
            };
            yield Event::default().json_data(chunk_json).map_err(|e| {
                Error::new(ErrorDetails::Serialization {
                    message: format!("Failed to convert Value to Event: {e}"),
                })
            })
        }
        yield Ok(Event::default().data("[DONE]"));
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    async fn collect_event_data(stream: ChatStream) -> Vec<String> {
        prepare_serialized_events(stream)
            .map(|event| format!("{:?}", event.unwrap()))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_prepare_serialized_events_terminates_with_done() {
        let fragments: ChatStream = Box::pin(stream::iter(vec![
            Ok("2+2".to_string()),
            Ok("=4".to_string()),
        ]));
        let events = collect_event_data(fragments).await;
        assert_eq!(events.len(), 3);
        assert!(events[0].contains("2+2"));
        assert!(events[1].contains("=4"));
        assert!(events[2].contains("[DONE]"));
    }

    #[tokio::test]
    async fn test_prepare_serialized_events_embeds_errors() {
        let fragments: ChatStream = Box::pin(stream::iter(vec![Err(Error::new(
            ErrorDetails::GoogleAIStudioServer {
                message: "overloaded".to_string(),
            },
        ))]));
        let events = collect_event_data(fragments).await;
        assert_eq!(events.len(), 2);
        assert!(events[0].contains("error"));
        assert!(events[1].contains("[DONE]"));
    }
}
