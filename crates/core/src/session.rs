//! Session history trait.
//!
//! History is keyed by `channel:participant` and bounded: once a session
//! holds [`MAX_HISTORY`] turns, each append drops the oldest one.
//! Implementations must serialize mutations of a given key, since a live
//! chat turn and a scheduled job may share one.

use async_trait::async_trait;
use crate::message::Message;

/// Default bound on turns retained per session.
pub const MAX_HISTORY: usize = 20;

/// The Session History Store. All operations are total.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Ordered turns for a session, oldest first. Unknown keys are empty.
    async fn get(&self, key: &str) -> Vec<Message>;

    /// Append a turn, evicting from the front to stay within the bound.
    async fn append(&self, key: &str, message: Message);

    /// Forget one session.
    async fn clear(&self, key: &str);

    /// Forget every session.
    async fn clear_all(&self);

    /// Keys with at least one retained turn.
    async fn keys(&self) -> Vec<String>;
}
