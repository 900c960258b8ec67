//! Discord guild-channel client.
//!
//! Maps the topology API onto Discord's REST surface: categories are
//! channel type 4, voice channels type 2, and a guild id is the scope.

use crate::error::SyncError;
use crate::remote::{EntityKind, EntityUpdate, RemoteEntity, TopologyApi};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CHANNEL_TYPE_VOICE: u8 = 2;
const CHANNEL_TYPE_CATEGORY: u8 = 4;

#[derive(Clone)]
pub struct DiscordApi {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: u8,
    parent_id: Option<String>,
}

#[derive(Serialize)]
struct CreateChannelBody<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
}

#[derive(Serialize)]
struct ModifyChannelBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
}

impl DiscordApi {
    /// Client for the public Discord API using a bot token.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Client against an alternate base URL (proxies, test doubles).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
            client,
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);
        Err(SyncError::Status { status, message })
    }

    fn entity_from(channel: DiscordChannel) -> Option<RemoteEntity> {
        let kind = match channel.kind {
            CHANNEL_TYPE_CATEGORY => EntityKind::Category,
            CHANNEL_TYPE_VOICE => EntityKind::Voice,
            // Text channels, threads and the rest are not mirrored.
            _ => return None,
        };
        Some(RemoteEntity {
            id: channel.id,
            name: channel.name,
            kind,
            parent_id: channel.parent_id,
        })
    }
}

#[async_trait]
impl TopologyApi for DiscordApi {
    async fn list_entities(&self, scope: &str) -> Result<Vec<RemoteEntity>, SyncError> {
        let response = self
            .client
            .get(format!("{}/guilds/{scope}/channels", self.base_url))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        let channels: Vec<DiscordChannel> = Self::check(response).await?.json().await?;
        Ok(channels
            .into_iter()
            .filter_map(Self::entity_from)
            .collect())
    }

    async fn create_entity(
        &self,
        scope: &str,
        kind: EntityKind,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<RemoteEntity, SyncError> {
        let body = CreateChannelBody {
            name,
            kind: match kind {
                EntityKind::Category => CHANNEL_TYPE_CATEGORY,
                EntityKind::Voice => CHANNEL_TYPE_VOICE,
            },
            parent_id,
        };
        let response = self
            .client
            .post(format!("{}/guilds/{scope}/channels", self.base_url))
            .header(AUTHORIZATION, self.auth())
            .json(&body)
            .send()
            .await?;
        let channel: DiscordChannel = Self::check(response).await?.json().await?;
        Ok(RemoteEntity {
            id: channel.id,
            name: channel.name,
            kind,
            parent_id: channel.parent_id,
        })
    }

    async fn update_entity(&self, id: &str, update: EntityUpdate) -> Result<(), SyncError> {
        let body = ModifyChannelBody {
            name: update.name,
            parent_id: update.parent_id,
        };
        let response = self
            .client
            .patch(format!("{}/channels/{id}", self.base_url))
            .header(AUTHORIZATION, self.auth())
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_entity(&self, id: &str) -> Result<(), SyncError> {
        let response = self
            .client
            .delete(format!("{}/channels/{id}", self.base_url))
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;
        // Already gone counts as deleted.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }
}
