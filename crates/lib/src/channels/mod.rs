//! Chat platform side: message types, the platform client and its trait,
//! per-channel cursors and the dispatch sender.
//!
//! The orchestrator talks to the platform only through [`MessagePlatform`] so
//! the polling loop can run against a fake in tests.

mod cursor;
mod discord;
mod dispatch;
mod inbound;
mod platform;

pub use cursor::{accept, is_newer_id, BotIdentity, ChannelCursor};
pub use discord::DiscordClient;
pub use dispatch::{build_payload, DispatchError, DispatchSender};
pub use inbound::{InboundMessage, SYSTEM_NOTICE_TYPE};
pub use platform::{MessagePlatform, MessageReference, OutboundMessage, PlatformError};
