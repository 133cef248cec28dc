//! Platform trait: the three calls the relay makes against the chat service.

use crate::channels::cursor::BotIdentity;
use crate::channels::dispatch::DispatchError;
use crate::channels::inbound::InboundMessage;
use crate::http::HttpError;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("platform request failed: {0}")]
    Http(#[from] HttpError),
    #[error("platform response malformed: {0}")]
    Malformed(String),
}

/// Reference to the message being replied to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageReference {
    pub message_id: String,
}

/// Body of a message-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_reference: Option<MessageReference>,
}

/// Read/write access to a chat platform.
#[async_trait]
pub trait MessagePlatform: Send + Sync {
    /// "Who am I": the account the token belongs to.
    async fn current_user(&self) -> Result<BotIdentity, PlatformError>;

    /// Most recent message in the channel, if any.
    async fn latest_message(&self, channel_id: &str) -> Result<Option<InboundMessage>, PlatformError>;

    /// Create a message in the channel.
    async fn create_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), DispatchError>;
}
