use axum::debug_handler;
use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::gateway_util::{AppState, AppStateData};
use crate::inference::types::ChatMessage;

/// A handler for `GET /conversation`: the full message history, oldest first
#[debug_handler(state = AppStateData)]
pub async fn get_conversation_handler(
    State(AppStateData { conversation, .. }): AppState,
) -> Json<Vec<ChatMessage>> {
    Json(conversation.snapshot().await)
}

/// A handler for `POST /reset`: drops the history and starts fresh.
/// Resetting an already-empty conversation succeeds.
#[debug_handler(state = AppStateData)]
pub async fn reset_handler(State(AppStateData { conversation, .. }): AppState) -> Json<Value> {
    conversation.reset().await;
    Json(json!({"status": "ok"}))
}
