//! The "process one inbound message" entry point.
//!
//! Channels, cron jobs, and the heartbeat all re-enter the reasoning loop
//! through [`MessageHandler`]; they depend on this trait rather than on the
//! agent crate itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::AgentError;

/// Where an inbound message came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Channel name (e.g., "cli", "cron", "heartbeat")
    pub channel: String,

    /// Participant identifier on that channel
    pub from: String,

    /// Whether the message came from a group conversation
    #[serde(default)]
    pub is_group: bool,

    /// Whether the sender is the agent's owner
    #[serde(default)]
    pub is_owner: bool,
}

impl InboundMessage {
    pub fn new(channel: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            from: from.into(),
            is_group: false,
            is_owner: false,
        }
    }

    pub fn owner(mut self) -> Self {
        self.is_owner = true;
        self
    }

    pub fn group(mut self) -> Self {
        self.is_group = true;
        self
    }

    /// The key that scopes conversation history: `channel:from`.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.from)
    }
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Run one inbound message to completion and return the reply text.
    async fn process_message(&self, text: &str, inbound: &InboundMessage) -> Result<String, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_joins_channel_and_sender() {
        let inbound = InboundMessage::new("telegram", "42");
        assert_eq!(inbound.session_key(), "telegram:42");
    }

    #[test]
    fn flags_default_off() {
        let inbound: InboundMessage =
            serde_json::from_str(r#"{"channel":"cli","from":"me"}"#).unwrap();
        assert!(!inbound.is_group);
        assert!(!inbound.is_owner);
        assert!(InboundMessage::new("cli", "me").owner().is_owner);
    }
}
