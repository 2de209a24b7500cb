//! Chat session history.
//!
//! Sessions live in a flat in-memory map keyed by session id. Nothing is
//! evicted and nothing survives a restart.

use async_trait::async_trait;
use flowdeck_core::error::StoreError;
use flowdeck_core::message::Message;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage for per-session message history.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Messages for a session, or `None` if the session has never been saved.
    async fn load(&self, session_id: &str) -> Result<Option<Vec<Message>>, StoreError>;

    /// Replace the stored history of a session.
    async fn save(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError>;
}

/// An in-memory history store.
#[derive(Clone, Default)]
pub struct InMemoryHistory {
    sessions: Arc<RwLock<HashMap<String, Vec<Message>>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn load(&self, session_id: &str) -> Result<Option<Vec<Message>>, StoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError> {
        tracing::debug!(session_id, messages = messages.len(), "Saving session history");
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), messages);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_session_is_none() {
        let store = InMemoryHistory::new();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_history() {
        let store = InMemoryHistory::new();
        store
            .save("s1", vec![Message::user("hi"), Message::model("hello")])
            .await
            .unwrap();
        assert_eq!(store.load("s1").await.unwrap().unwrap().len(), 2);

        store.save("s1", vec![Message::user("reset")]).await.unwrap();
        let history = store.load("s1").await.unwrap().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].text(), "reset");
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemoryHistory::new();
        store.save("a", vec![Message::user("from a")]).await.unwrap();
        store.save("b", vec![Message::user("from b")]).await.unwrap();
        assert_eq!(store.session_count().await, 2);
        assert_eq!(store.load("b").await.unwrap().unwrap()[0].text(), "from b");
    }
}
