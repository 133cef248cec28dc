//! Per-channel cursor and the acceptance filter for newly observed messages.

use crate::channels::inbound::InboundMessage;

/// The relay's own account on the platform. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: String,
}

/// Highest message id already handled in one channel. Only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCursor {
    channel_id: String,
    last_seen_message_id: Option<String>,
}

impl ChannelCursor {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            last_seen_message_id: None,
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen_message_id.as_deref()
    }

    /// True when `id` has not been handled yet.
    pub fn is_unseen(&self, id: &str) -> bool {
        match &self.last_seen_message_id {
            None => true,
            Some(last) => is_newer_id(id, last),
        }
    }

    /// Move the cursor to `id` if it is newer; older or equal ids are ignored.
    /// Returns whether the cursor moved.
    pub fn advance(&mut self, id: &str) -> bool {
        if !self.is_unseen(id) {
            return false;
        }
        self.last_seen_message_id = Some(id.to_string());
        true
    }
}

/// Compare platform ids as unsigned decimal numbers of arbitrary width.
///
/// Snowflake ids grow monotonically; comparing digit strings by length and then
/// lexicographically avoids overflow and keeps non-numeric ids totally ordered.
pub fn is_newer_id(candidate: &str, last: &str) -> bool {
    let candidate = normalize_id(candidate);
    let last = normalize_id(last);
    (candidate.len(), candidate) > (last.len(), last)
}

fn normalize_id(id: &str) -> &str {
    let trimmed = id.trim().trim_start_matches('0');
    if trimmed.is_empty() && !id.trim().is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// Whether a freshly fetched message should be processed: not ours, not a
/// system notice, and newer than the channel cursor.
///
/// The caller advances the cursor once processing is finished.
pub fn accept(message: &InboundMessage, cursor: &ChannelCursor, identity: &BotIdentity) -> bool {
    if message.author_id == identity.user_id {
        log::debug!("{}: skipping own message {}", cursor.channel_id(), message.id);
        return false;
    }
    if message.is_system_notice() {
        log::debug!("{}: skipping system notice {}", cursor.channel_id(), message.id);
        return false;
    }
    cursor.is_unseen(&message.id)
}
