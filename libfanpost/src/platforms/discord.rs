//! Discord adapter: incoming webhook, or bot token plus channel id

use async_trait::async_trait;
use serde_json::json;

use crate::credentials::DiscordConfig;
use crate::error::{ConfigError, PlatformError, Result};
use crate::platforms::{ensure_success, id_at, json_body, truncate_chars, PlatformAdapter};
use crate::types::Platform;

pub const MESSAGE_MAX_CHARS: usize = 2_000;

const ERROR_POINTERS: &[&str] = &["/message"];

pub struct DiscordAdapter {
    client: reqwest::Client,
    base_url: String,
    config: DiscordConfig,
}

/// Reachability probe for a webhook URL: true on HTTP 200 or 204
pub async fn probe_webhook(client: &reqwest::Client, webhook_url: &str) -> bool {
    match client.get(webhook_url).send().await {
        Ok(r) => matches!(r.status().as_u16(), 200 | 204),
        Err(e) => {
            tracing::debug!(error = %e, "Discord webhook probe failed");
            false
        }
    }
}

impl DiscordAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, config: DiscordConfig) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    fn bot_token(&self) -> Option<&str> {
        self.config
            .bot_token
            .as_ref()
            .filter(|t| !t.is_blank())
            .map(|t| t.expose())
    }

    async fn send_webhook(&self, url: &str, content: &str) -> Result<String> {
        let response = self
            .client
            .post(url)
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| PlatformError::from_transport(Platform::Discord, "webhook", e))?;

        let status = response.status().as_u16();
        if !matches!(status, 200 | 204) {
            let response = ensure_success(Platform::Discord, response, ERROR_POINTERS).await?;
            // 2xx other than 200/204 is not a confirmed delivery
            return Err(PlatformError::Posting(format!(
                "Discord webhook returned unexpected status {}",
                response.status().as_u16()
            ))
            .into());
        }

        // Delivered. A 200 (`?wait=true`) may carry the message; anything
        // else in the body only loses the remote id.
        let body = response.text().await.unwrap_or_default();
        let remote_id = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|json| id_at(&json, "/id"));
        Ok(remote_id.unwrap_or_else(|| {
            format!("webhook-{}", chrono::Utc::now().timestamp_millis())
        }))
    }

    async fn send_bot(&self, token: &str, channel_id: &str, content: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/channels/{}/messages", self.base_url, channel_id))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", token))
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| PlatformError::from_transport(Platform::Discord, "bot message", e))?;

        let response = ensure_success(Platform::Discord, response, ERROR_POINTERS).await?;
        let json = json_body(Platform::Discord, "bot message", response).await?;

        id_at(&json, "/id").ok_or_else(|| {
            PlatformError::Posting("Discord response did not include a message id".to_string())
                .into()
        })
    }
}

#[async_trait]
impl PlatformAdapter for DiscordAdapter {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    async fn publish(&self, content: &str, _media_url: Option<&str>) -> Result<String> {
        let content = truncate_chars(content, MESSAGE_MAX_CHARS);

        if let Some(url) = self.config.webhook() {
            return self.send_webhook(url, content).await;
        }

        match self.bot_token() {
            Some(token) => {
                let channel_id = self
                    .config
                    .channel_id
                    .as_deref()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingField("discord.channel_id".to_string()))?;
                self.send_bot(token, channel_id, content).await
            }
            None => Err(ConfigError::MissingField(
                "discord.webhook_url or discord.bot_token".to_string(),
            )
            .into()),
        }
    }

    async fn verify_connection(&self) -> bool {
        if let Some(url) = self.config.webhook() {
            return probe_webhook(&self.client, url).await;
        }

        let Some(token) = self.bot_token() else {
            return false;
        };

        let response = self
            .client
            .get(format!("{}/users/@me", self.base_url))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", token))
            .send()
            .await;

        match response {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Discord bot verify request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FanpostError;

    #[tokio::test]
    async fn test_publish_without_any_route_is_config_error() {
        let adapter = DiscordAdapter::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            DiscordConfig::default(),
        );

        let err = adapter.publish("hello", None).await.unwrap_err();
        assert!(matches!(err, FanpostError::Config(ConfigError::MissingField(_))));
        assert!(!adapter.verify_connection().await);
    }

    #[tokio::test]
    async fn test_bot_without_channel_is_config_error() {
        let adapter = DiscordAdapter::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            DiscordConfig {
                bot_token: Some("bot".into()),
                ..Default::default()
            },
        );

        let err = adapter.publish("hello", None).await.unwrap_err();
        assert!(err.to_string().contains("discord.channel_id"));
    }
}
