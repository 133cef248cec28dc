//! Polling loop: for each configured channel, fetch the latest message, filter it
//! through the channel cursor, run the reply policy, compose text, wait the reply
//! delay, dispatch, and advance the cursor.
//!
//! Channels are polled round-robin with the read delay after each channel. Only
//! the most recent message of each poll is considered; anything that arrived in
//! between is skipped. A message is handled at most once: the cursor moves past
//! it after the dispatch attempt whether or not the dispatch succeeded.

use crate::channels::{
    accept, BotIdentity, ChannelCursor, DiscordClient, DispatchSender, MessagePlatform,
};
use crate::config::{self, Config, ConfigError, ReplyMode, StyleLanguage};
use crate::http::RetryClient;
use crate::llm::{GeminiClient, GenerationGateway};
use crate::policy::{Decision, ReplyPolicy};
use crate::shutdown::Shutdown;
use crate::static_messages::StaticMessages;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Per-run reply settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyConfiguration {
    pub use_generation: bool,
    /// Substitute a random static line when generation falls back.
    pub use_static_fallback: bool,
    pub mode: ReplyMode,
    pub language: StyleLanguage,
    pub read_delay: Duration,
    pub reply_delay: Duration,
}

impl ReplyConfiguration {
    pub fn from_config(config: &Config) -> Self {
        Self {
            use_generation: config.generation.enabled,
            use_static_fallback: config.reply.use_static_fallback,
            mode: config.reply.mode,
            language: config.reply.language,
            read_delay: Duration::from_secs(config.reply.read_delay_secs),
            reply_delay: Duration::from_secs(config.reply.reply_delay_secs),
        }
    }
}

/// What one poll of one channel did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The channel has no messages.
    Empty,
    /// The latest message is ours, a system notice, or already handled.
    NothingNew,
    /// Reading the channel failed; retried on the next poll.
    FetchFailed,
    Declined { message_id: String },
    Replied { message_id: String },
    DispatchFailed { message_id: String },
    /// Shutdown arrived during the reply delay; nothing was sent.
    Interrupted,
}

/// Everything the relay needs apart from its identity and cursors.
pub struct RelayComponents {
    pub platform: Arc<dyn MessagePlatform>,
    /// Present when generation is enabled.
    pub gateway: Option<GenerationGateway>,
    pub static_messages: StaticMessages,
    pub policy: ReplyPolicy,
    pub settings: ReplyConfiguration,
    pub rng: StdRng,
}

pub struct Relay {
    platform: Arc<dyn MessagePlatform>,
    sender: DispatchSender,
    gateway: Option<GenerationGateway>,
    static_messages: StaticMessages,
    policy: ReplyPolicy,
    settings: ReplyConfiguration,
    rng: StdRng,
    identity: BotIdentity,
    cursors: Vec<ChannelCursor>,
}

impl Relay {
    /// Resolve the bot identity and set up one cursor per channel.
    /// Fails when no channel is given or the identity cannot be resolved.
    pub async fn start(components: RelayComponents, channels: &[String]) -> Result<Self> {
        let cursors: Vec<ChannelCursor> = channels
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(ChannelCursor::new)
            .collect();
        if cursors.is_empty() {
            return Err(ConfigError::NoChannels.into());
        }
        let identity = components
            .platform
            .current_user()
            .await
            .context("resolving bot identity")?;
        log::info!(
            "relay running as user {} on {} channel(s)",
            identity.user_id,
            cursors.len()
        );
        Ok(Self {
            sender: DispatchSender::new(components.platform.clone()),
            platform: components.platform,
            gateway: components.gateway,
            static_messages: components.static_messages,
            policy: components.policy,
            settings: components.settings,
            rng: components.rng,
            identity,
            cursors,
        })
    }

    /// Build the relay against Discord and Gemini from config, then [`Relay::start`] it.
    /// Retry waits of every outbound call end early once `shutdown` is triggered.
    pub async fn from_config(
        config: &Config,
        config_path: &Path,
        shutdown: &Shutdown,
    ) -> Result<Self> {
        config::validate(config)?;
        let credentials = config::resolve_credentials(config)?;
        if config.reply.language == StyleLanguage::Unsupported {
            log::warn!("unsupported reply language configured, using the default style directive");
        }
        let http = RetryClient::new(&config.http)?.with_shutdown(shutdown.clone());
        let platform: Arc<dyn MessagePlatform> = Arc::new(DiscordClient::new(
            Some(config.platform.api_base.clone()),
            credentials.platform_token,
            http.clone(),
        ));
        let gateway = credentials.generation_key.map(|key| {
            let client = GeminiClient::new(
                Some(config.generation.api_base.clone()),
                Some(config.generation.model.clone()),
                key,
                http,
            );
            GenerationGateway::new(Arc::new(client), &config.generation)
        });
        let components = RelayComponents {
            platform,
            gateway,
            static_messages: StaticMessages::new(config::resolve_messages_file(config, config_path)),
            policy: ReplyPolicy::new(&config.policy),
            settings: ReplyConfiguration::from_config(config),
            rng: StdRng::from_entropy(),
        };
        Self::start(components, &config.platform.channels).await
    }

    pub fn identity(&self) -> &BotIdentity {
        &self.identity
    }

    pub fn cursors(&self) -> &[ChannelCursor] {
        &self.cursors
    }

    pub fn cursor(&self, channel_id: &str) -> Option<&ChannelCursor> {
        self.cursors.iter().find(|c| c.channel_id() == channel_id)
    }

    /// Text for a message the policy wants answered: generated, or a static line
    /// when generation is off (or fell back and static fallback is enabled).
    async fn compose(&mut self, channel_id: &str, source_text: &str) -> String {
        let gateway = self
            .gateway
            .as_ref()
            .filter(|_| self.settings.use_generation);
        if let Some(gateway) = gateway {
            let reply = gateway
                .generate(channel_id, source_text, self.settings.language)
                .await;
            if !(reply.fallback && self.settings.use_static_fallback) {
                return reply.text;
            }
            log::info!("generation fell back, using a static message instead");
        }
        self.static_messages.pick(&mut self.rng).await
    }

    /// One poll of the channel at `index` (position in [`Relay::cursors`]).
    /// `None` when there is no such channel.
    pub async fn poll_channel(
        &mut self,
        index: usize,
        shutdown: &Shutdown,
    ) -> Option<CycleOutcome> {
        let channel_id = self.cursors.get(index)?.channel_id().to_string();
        Some(self.poll_at(index, channel_id, shutdown).await)
    }

    async fn poll_at(
        &mut self,
        index: usize,
        channel_id: String,
        shutdown: &Shutdown,
    ) -> CycleOutcome {
        let message = match self.platform.latest_message(&channel_id).await {
            Ok(Some(message)) => message,
            Ok(None) => return CycleOutcome::Empty,
            Err(e) => {
                log::warn!("reading messages from {} failed: {}", channel_id, e);
                return CycleOutcome::FetchFailed;
            }
        };
        if !accept(&message, &self.cursors[index], &self.identity) {
            return CycleOutcome::NothingNew;
        }
        log::info!("message received in {}: {}", channel_id, message.text);

        let text = match self.policy.decide(&message, &mut self.rng) {
            Decision::Decline => {
                log::info!("not replying to message {} in {}", message.id, channel_id);
                self.cursors[index].advance(&message.id);
                return CycleOutcome::Declined {
                    message_id: message.id,
                };
            }
            Decision::Canned(text) => text,
            Decision::Generate => self.compose(&channel_id, &message.text).await,
        };

        log::info!(
            "waiting {}s before replying in {}",
            self.settings.reply_delay.as_secs(),
            channel_id
        );
        if !shutdown.sleep(self.settings.reply_delay).await {
            return CycleOutcome::Interrupted;
        }

        let reply_to = match self.settings.mode {
            ReplyMode::Reply => Some(message.id.as_str()),
            ReplyMode::Send => None,
        };
        let sent = self
            .sender
            .send(&channel_id, &text, reply_to, self.settings.mode)
            .await;
        self.cursors[index].advance(&message.id);
        match sent {
            Ok(()) => CycleOutcome::Replied {
                message_id: message.id,
            },
            Err(_) => CycleOutcome::DispatchFailed {
                message_id: message.id,
            },
        }
    }

    /// Poll every channel once, sleeping the read delay after each.
    /// Returns false when shutdown was observed.
    pub async fn run_cycle(&mut self, shutdown: &Shutdown) -> bool {
        for index in 0..self.cursors.len() {
            if shutdown.is_triggered() {
                return false;
            }
            let channel_id = self.cursors[index].channel_id().to_string();
            let outcome = self.poll_at(index, channel_id.clone(), shutdown).await;
            log::debug!("{}: {:?}", channel_id, outcome);
            log::info!(
                "waiting {}s before checking for new messages",
                self.settings.read_delay.as_secs()
            );
            if !shutdown.sleep(self.settings.read_delay).await {
                return false;
            }
        }
        true
    }

    /// Poll forever until shutdown.
    pub async fn run(&mut self, shutdown: Shutdown) {
        while self.run_cycle(&shutdown).await {}
        log::info!("relay loop stopped");
    }
}
