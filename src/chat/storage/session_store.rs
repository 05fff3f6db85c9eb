//! Durable mirror of the session list.
//!
//! The whole list lives under one key and is rewritten on every save. Reads
//! and writes fail soft: the controller's in-memory state stays
//! authoritative when the store misbehaves.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::chat::core::errors::ChatResult;
use crate::chat::core::session::Session;
use crate::chat::storage::kv_store::KeyValueStore;

/// Session list persistence over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    /// Create a store writing under `key`.
    pub fn new(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Load all sessions, newest first. Returns an empty list on any failure.
    pub async fn load(&self) -> Vec<Session> {
        match self.try_load().await {
            Ok(sessions) => {
                debug!("Loaded {} sessions from '{}'", sessions.len(), self.key);
                sessions
            }
            Err(err) => {
                warn!("Failed to load chats: {err}");
                Vec::new()
            }
        }
    }

    /// Overwrite the persisted list. Errors are logged and swallowed.
    pub async fn save(&self, sessions: &[Session]) {
        if let Err(err) = self.try_save(sessions).await {
            error!("Failed to save chats: {err}");
        }
    }

    async fn try_load(&self) -> ChatResult<Vec<Session>> {
        let Some(raw) = self.backend.get_item(&self.key).await? else {
            return Ok(Vec::new());
        };
        let mut sessions: Vec<Session> = serde_json::from_str(&raw)?;
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn try_save(&self, sessions: &[Session]) -> ChatResult<()> {
        let raw = serde_json::to_string(sessions)?;
        self.backend.set_item(&self.key, raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::core::errors::ChatError;
    use crate::chat::core::message::Message;
    use crate::chat::storage::kv_store::{MemoryKeyValueStore, StoreFuture};
    use chrono::{Duration, Utc};

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get_item(&self, _key: &str) -> StoreFuture<'_, ChatResult<Option<String>>> {
            Box::pin(async { Err(ChatError::Stream("disk on fire".to_string())) })
        }

        fn set_item(&self, _key: &str, _value: String) -> StoreFuture<'_, ChatResult<()>> {
            Box::pin(async { Err(ChatError::Stream("disk on fire".to_string())) })
        }
    }

    fn sessions(n: i64) -> Vec<Session> {
        (0..n)
            .map(|i| {
                let mut s = Session::start(Message::user(format!("chat {i}"), None));
                s.created_at = Utc::now() - Duration::minutes(i);
                s
            })
            .collect()
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let store = SessionStore::new(Arc::new(MemoryKeyValueStore::new()), "history");
        let input = sessions(3);
        store.save(&input).await;
        assert_eq!(store.load().await, input);
    }

    #[tokio::test]
    async fn test_load_normalizes_newest_first() {
        let store = SessionStore::new(Arc::new(MemoryKeyValueStore::new()), "history");
        let mut input = sessions(4);
        input.reverse();
        store.save(&input).await;
        let loaded = store.load().await;
        assert_eq!(loaded[0].title, "chat 0");
        assert_eq!(loaded[3].title, "chat 3");
    }

    #[tokio::test]
    async fn test_load_missing_key_is_empty() {
        let store = SessionStore::new(Arc::new(MemoryKeyValueStore::new()), "history");
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_data_is_empty() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        assert!(backend.set_item("history", "{not json".to_string()).await.is_ok());
        let store = SessionStore::new(backend, "history");
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_failing_backend_is_soft() {
        let store = SessionStore::new(Arc::new(FailingStore), "history");
        store.save(&sessions(1)).await;
        assert!(store.load().await.is_empty());
    }
}
