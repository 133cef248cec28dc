//! Relay core library: chat platform client, generation gateway, reply policy,
//! and the polling loop used by the CLI.

pub mod broadcast;
pub mod channels;
pub mod config;
pub mod http;
pub mod init;
pub mod llm;
pub mod policy;
pub mod relay;
pub mod shutdown;
pub mod static_messages;
