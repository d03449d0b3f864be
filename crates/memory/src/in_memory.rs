//! In-memory session store: the process-lifetime history cache.

use async_trait::async_trait;
use cinder_core::message::Message;
use cinder_core::session::{MAX_HISTORY, SessionStore};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps each session's most recent turns in a ring buffer.
///
/// A single lock guards the whole map, so mutations of one key can never
/// interleave. Sessions are created on first append and live until cleared.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, VecDeque<Message>>>>,
    max_history: usize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }

    /// A store retaining at most `max_history` turns per session (minimum 1).
    pub fn with_capacity(max_history: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_history: max_history.max(1),
        }
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn append(&self, key: &str, message: Message) {
        let mut sessions = self.sessions.write().await;
        let turns = sessions.entry(key.to_string()).or_default();
        turns.push_back(message);
        while turns.len() > self.max_history {
            turns.pop_front();
        }
    }

    async fn clear(&self, key: &str) {
        self.sessions.write().await.remove(key);
    }

    async fn clear_all(&self) {
        self.sessions.write().await.clear();
    }

    async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}
