//! Discord REST client: identity lookup, latest message read, message creation.

use crate::channels::cursor::BotIdentity;
use crate::channels::dispatch::DispatchError;
use crate::channels::inbound::InboundMessage;
use crate::channels::platform::{MessagePlatform, OutboundMessage, PlatformError};
use crate::http::{HttpError, RetryClient};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;

const DISCORD_API_BASE: &str = "https://discord.com/api/v9";

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    author: Option<DiscordUser>,
    #[serde(default, rename = "type")]
    kind: Option<i64>,
    #[serde(default)]
    content: Option<String>,
}

impl From<DiscordMessage> for InboundMessage {
    fn from(m: DiscordMessage) -> Self {
        InboundMessage {
            id: m.id,
            author_id: m.author.map(|a| a.id).unwrap_or_default(),
            kind: m.kind.unwrap_or(0),
            text: m.content.unwrap_or_default(),
        }
    }
}

/// Discord channel connector. All calls go through the shared [`RetryClient`].
#[derive(Clone)]
pub struct DiscordClient {
    base_url: String,
    token: String,
    http: RetryClient,
}

impl DiscordClient {
    pub fn new(base_url: Option<String>, token: String, http: RetryClient) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DISCORD_API_BASE.to_string());
        Self {
            base_url,
            token,
            http,
        }
    }

    fn build(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Request, HttpError> {
        builder
            .header(AUTHORIZATION, &self.token)
            .build()
            .map_err(|e| HttpError::Request(e.to_string()))
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/messages", self.base_url, channel_id)
    }
}

#[async_trait]
impl MessagePlatform for DiscordClient {
    /// GET /users/@me
    async fn current_user(&self) -> Result<BotIdentity, PlatformError> {
        let url = format!("{}/users/@me", self.base_url);
        let req = self.build(self.http.client().get(&url))?;
        let res = self.http.execute(req).await?;
        let user: DiscordUser = res
            .json()
            .await
            .map_err(|e| PlatformError::Malformed(e.to_string()))?;
        Ok(BotIdentity { user_id: user.id })
    }

    /// GET /channels/{id}/messages?limit=1; the platform returns newest first.
    async fn latest_message(&self, channel_id: &str) -> Result<Option<InboundMessage>, PlatformError> {
        let req = self.build(
            self.http
                .client()
                .get(self.messages_url(channel_id))
                .query(&[("limit", "1")]),
        )?;
        let res = self.http.execute(req).await?;
        let messages: Vec<DiscordMessage> = res
            .json()
            .await
            .map_err(|e| PlatformError::Malformed(e.to_string()))?;
        Ok(messages.into_iter().next().map(InboundMessage::from))
    }

    /// POST /channels/{id}/messages. Only 201 Created counts as delivered.
    async fn create_message(
        &self,
        channel_id: &str,
        message: &OutboundMessage,
    ) -> Result<(), DispatchError> {
        let req = self.build(
            self.http
                .client()
                .post(self.messages_url(channel_id))
                .json(message),
        )?;
        let res = self.http.execute(req).await?;
        let status = res.status();
        if status != StatusCode::CREATED {
            let body = res.text().await.unwrap_or_default();
            return Err(DispatchError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
