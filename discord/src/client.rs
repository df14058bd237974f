//! Discord REST client.

use crate::wire::{
    CommandDefinition, CreateChannelBody, IdResponse, MessageBody, WireMessage, WireOverwrite,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use whitelist_core::messaging::{
    ChannelSpec, Messenger, MessagingError, MessagingFuture, OutboundMessage, PostedMessage,
};
use whitelist_core::request::{ChannelId, GuildId, MessageId, UserId};

/// Default REST base URL
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

/// Discord REST client implementing [`Messenger`].
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct DiscordClient {
    client: Client,
    token: String,
    api_base: String,
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient").field("api_base", &self.api_base).finish_non_exhaustive()
    }
}

impl DiscordClient {
    /// Client for the public API
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base(token, DEFAULT_API_BASE)
    }

    /// Client for a custom base URL (proxies, tests)
    #[must_use]
    pub fn with_base(token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Replace the guild's slash commands with `commands`.
    ///
    /// # Errors
    ///
    /// Returns a [`MessagingError`] if the request fails or is refused.
    #[tracing::instrument(skip(self, commands), fields(count = commands.len()))]
    pub async fn register_commands(
        &self,
        application: &str,
        guild: &GuildId,
        commands: &[CommandDefinition],
    ) -> Result<(), MessagingError> {
        let path = format!("/applications/{application}/guilds/{guild}/commands");
        self.send(self.request(Method::PUT, &path).json(commands)).await?;
        tracing::info!("Slash commands registered");
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.api_base))
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, MessagingError> {
        let response = request
            .send()
            .await
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        let status = response.status();
        metrics::counter!("discord.requests", "status" => status.as_str().to_string()).increment(1);

        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Discord rejected request");
            Err(MessagingError::Rejected { status: status.as_u16(), body })
        }
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, MessagingError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.request(method, path).json(body))
            .await?
            .json::<T>()
            .await
            .map_err(|e| MessagingError::Decode(e.to_string()))
    }
}

impl Messenger for DiscordClient {
    fn send_message(&self, channel: ChannelId, message: OutboundMessage) -> MessagingFuture<'_, MessageId> {
        Box::pin(async move {
            let body = MessageBody::from(&message);
            let created: IdResponse = self
                .send_json(Method::POST, &format!("/channels/{channel}/messages"), &body)
                .await?;
            Ok(MessageId::new(created.id))
        })
    }

    fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        edit: OutboundMessage,
    ) -> MessagingFuture<'_, ()> {
        Box::pin(async move {
            let body = MessageBody::from(&edit);
            self.send(
                self.request(Method::PATCH, &format!("/channels/{channel}/messages/{message}"))
                    .json(&body),
            )
            .await?;
            Ok(())
        })
    }

    fn delete_channel(&self, channel: ChannelId, delay: Duration) -> MessagingFuture<'_, ()> {
        let client = self.clone();
        Box::pin(async move {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let path = format!("/channels/{channel}");
                match client.send(client.request(Method::DELETE, &path)).await {
                    Ok(_) => tracing::info!(channel = %channel, "Channel deleted"),
                    Err(e) => tracing::warn!(channel = %channel, error = %e, "Channel deletion failed"),
                }
            });
            Ok(())
        })
    }

    fn create_channel(&self, spec: ChannelSpec) -> MessagingFuture<'_, ChannelId> {
        Box::pin(async move {
            let body = CreateChannelBody {
                name: spec.name,
                kind: 0,
                parent_id: spec.parent.map(|p| p.as_str().to_string()),
                permission_overwrites: spec.overwrites.iter().map(WireOverwrite::from).collect(),
            };
            let created: IdResponse = self
                .send_json(Method::POST, &format!("/guilds/{}/channels", spec.guild), &body)
                .await?;
            Ok(ChannelId::new(created.id))
        })
    }

    fn open_direct_message(&self, user: UserId) -> MessagingFuture<'_, ChannelId> {
        Box::pin(async move {
            let body = serde_json::json!({ "recipient_id": user.as_str() });
            let dm: IdResponse = self.send_json(Method::POST, "/users/@me/channels", &body).await?;
            Ok(ChannelId::new(dm.id))
        })
    }

    fn recent_messages(&self, channel: ChannelId, limit: u8) -> MessagingFuture<'_, Vec<PostedMessage>> {
        Box::pin(async move {
            let path = format!("/channels/{channel}/messages?limit={limit}");
            let messages: Vec<WireMessage> = self
                .send(self.request(Method::GET, &path))
                .await?
                .json()
                .await
                .map_err(|e| MessagingError::Decode(e.to_string()))?;

            Ok(messages
                .into_iter()
                .map(|m| PostedMessage {
                    id: MessageId::new(m.id),
                    author: UserId::new(m.author.id),
                    embed_title: m.embeds.into_iter().next().and_then(|e| e.title),
                })
                .collect())
        })
    }
}
