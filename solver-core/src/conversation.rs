//! In-memory, append-only conversation store.
//!
//! The store holds the full message history for the single active
//! conversation. Messages are only ever appended; `reset` replaces the
//! history with an empty one and is a no-op on an empty store.

use tokio::sync::Mutex;

use crate::inference::types::ChatMessage;

#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Mutex<Vec<ChatMessage>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, message: ChatMessage) {
        self.messages.lock().await.push(message);
    }

    pub async fn reset(&self) {
        self.messages.lock().await.clear();
    }

    /// Returns a point-in-time copy of the history
    pub async fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::Role;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = ConversationStore::new();
        store
            .append(ChatMessage::user_text("what is 2+2?".to_string()))
            .await;
        store
            .append(ChatMessage::assistant_text("4".to_string()))
            .await;
        store
            .append(ChatMessage::user_text("and 3+3?".to_string()))
            .await;

        let messages = store.snapshot().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[2].role, Role::User);
    }

    #[tokio::test]
    async fn test_reset_clears_history() {
        let store = ConversationStore::new();
        store
            .append(ChatMessage::user_text("hello".to_string()))
            .await;
        assert_eq!(store.len().await, 1);

        store.reset().await;
        assert!(store.is_empty().await);

        // Resetting an empty store is a no-op, not an error.
        store.reset().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let store = ConversationStore::new();
        store
            .append(ChatMessage::user_text("hello".to_string()))
            .await;
        let snapshot = store.snapshot().await;
        store.reset().await;
        assert_eq!(snapshot.len(), 1);
    }
}
