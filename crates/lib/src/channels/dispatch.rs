//! Dispatch sender: turns reply text into a platform message, threaded or not.

use crate::channels::platform::{MessagePlatform, MessageReference, OutboundMessage};
use crate::config::ReplyMode;
use crate::http::HttpError;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch request failed: {0}")]
    Http(#[from] HttpError),
    #[error("dispatch returned unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// Build the message body. The reply reference is attached only in reply mode
/// and only when there is a message to reply to.
pub fn build_payload(text: &str, reply_to: Option<&str>, mode: ReplyMode) -> OutboundMessage {
    let message_reference = match (mode, reply_to) {
        (ReplyMode::Reply, Some(id)) => Some(MessageReference {
            message_id: id.to_string(),
        }),
        _ => None,
    };
    OutboundMessage {
        content: text.to_string(),
        message_reference,
    }
}

/// Posts outbound text to channels. Failures are logged and returned; they never panic.
#[derive(Clone)]
pub struct DispatchSender {
    platform: Arc<dyn MessagePlatform>,
}

impl DispatchSender {
    pub fn new(platform: Arc<dyn MessagePlatform>) -> Self {
        Self { platform }
    }

    pub async fn send(
        &self,
        channel_id: &str,
        text: &str,
        reply_to: Option<&str>,
        mode: ReplyMode,
    ) -> Result<(), DispatchError> {
        let payload = build_payload(text, reply_to, mode);
        match self.platform.create_message(channel_id, &payload).await {
            Ok(()) => {
                log::info!("message sent to {}: {}", channel_id, text);
                Ok(())
            }
            Err(e) => {
                log::warn!("sending message to {} failed: {}", channel_id, e);
                Err(e)
            }
        }
    }
}
