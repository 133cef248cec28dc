//! Inbound message observed in a channel.

/// Platform message type used for system notices (joins, pins, boosts...). Never answered.
pub const SYSTEM_NOTICE_TYPE: i64 = 8;

/// The fields of a platform message the relay acts on. Built per poll and discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: String,
    pub author_id: String,
    /// Platform message type (0 = default text message).
    pub kind: i64,
    pub text: String,
}

impl InboundMessage {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    pub fn is_system_notice(&self) -> bool {
        self.kind == SYSTEM_NOTICE_TYPE
    }
}
