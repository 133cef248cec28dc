//! Broadcast mode: post a random static line to every channel on a fixed interval.

use crate::channels::{DiscordClient, DispatchSender, MessagePlatform};
use crate::config::{self, Config, ConfigError, ReplyMode};
use crate::http::RetryClient;
use crate::shutdown::Shutdown;
use crate::static_messages::StaticMessages;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub struct Broadcaster {
    sender: DispatchSender,
    messages: StaticMessages,
    channels: Vec<String>,
    interval: Duration,
    rng: StdRng,
}

impl Broadcaster {
    pub fn new(
        platform: Arc<dyn MessagePlatform>,
        messages: StaticMessages,
        channels: &[String],
        interval: Duration,
        rng: StdRng,
    ) -> Result<Self> {
        let channels: Vec<String> = channels
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if channels.is_empty() {
            return Err(ConfigError::NoChannels.into());
        }
        Ok(Self {
            sender: DispatchSender::new(platform),
            messages,
            channels,
            interval,
            rng,
        })
    }

    /// Only the platform token is needed; generation settings are ignored.
    /// Retry waits end early once `shutdown` is triggered.
    pub fn from_config(config: &Config, config_path: &Path, shutdown: &Shutdown) -> Result<Self> {
        config::validate(config)?;
        let token = config::resolve_platform_token(config).ok_or(ConfigError::MissingPlatformToken)?;
        let http = RetryClient::new(&config.http)?.with_shutdown(shutdown.clone());
        let platform = Arc::new(DiscordClient::new(
            Some(config.platform.api_base.clone()),
            token,
            http,
        ));
        Self::new(
            platform,
            StaticMessages::new(config::resolve_messages_file(config, config_path)),
            &config.platform.channels,
            Duration::from_secs(config.broadcast.interval_secs),
            StdRng::from_entropy(),
        )
    }

    /// Send one line to each channel. Returns how many sends succeeded.
    pub async fn broadcast_once(&mut self) -> usize {
        let mut delivered = 0;
        for channel_id in &self.channels {
            let text = self.messages.pick(&mut self.rng).await;
            if self
                .sender
                .send(channel_id, &text, None, ReplyMode::Send)
                .await
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    pub async fn run(&mut self, shutdown: Shutdown) {
        log::info!(
            "broadcasting to {} channel(s) every {}s",
            self.channels.len(),
            self.interval.as_secs()
        );
        while !shutdown.is_triggered() {
            let delivered = self.broadcast_once().await;
            log::debug!("broadcast delivered to {}/{} channel(s)", delivered, self.channels.len());
            if !shutdown.sleep(self.interval).await {
                break;
            }
        }
        log::info!("broadcast loop stopped");
    }
}
