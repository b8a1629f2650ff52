//! Twitter/X adapter (API v2)

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::credentials::TwitterConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::{ensure_success, id_at, json_body, truncate_chars, PlatformAdapter};
use crate::types::Platform;

pub const TWEET_MAX_CHARS: usize = 280;

/// Minimum gap between consecutive tweets of a thread
pub const THREAD_PACING: Duration = Duration::from_secs(1);

const ERROR_POINTERS: &[&str] = &["/detail", "/title", "/errors/0/message"];

pub struct TwitterAdapter {
    client: reqwest::Client,
    base_url: String,
    config: TwitterConfig,
}

impl TwitterAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, config: TwitterConfig) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    async fn post_tweet(&self, text: &str, reply_to: Option<&str>) -> Result<String> {
        let mut body = json!({ "text": truncate_chars(text, TWEET_MAX_CHARS) });
        if let Some(parent) = reply_to {
            body["reply"] = json!({ "in_reply_to_tweet_id": parent });
        }

        let response = self
            .client
            .post(format!("{}/tweets", self.base_url))
            .bearer_auth(self.config.authorization_token().expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::from_transport(Platform::Twitter, "tweet", e))?;

        let response = ensure_success(Platform::Twitter, response, ERROR_POINTERS).await?;
        let json = json_body(Platform::Twitter, "tweet", response).await?;

        id_at(&json, "/data/id").ok_or_else(|| {
            PlatformError::Posting("Twitter response did not include data.id".to_string()).into()
        })
    }

    /// Post `tweets` as a reply chain and return their ids in order.
    ///
    /// Calls are strictly sequential, each replying to the id the previous
    /// call returned, with [`THREAD_PACING`] between calls. Stops at the
    /// first failure.
    pub async fn publish_thread(&self, tweets: &[String]) -> Result<Vec<String>> {
        let mut ids: Vec<String> = Vec::with_capacity(tweets.len());

        for (index, text) in tweets.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(THREAD_PACING).await;
            }

            let parent = ids.last().map(String::as_str);
            let id = self.post_tweet(text, parent).await?;
            tracing::debug!(index, tweet_id = %id, "Posted thread tweet");
            ids.push(id);
        }

        Ok(ids)
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    async fn publish(&self, content: &str, _media_url: Option<&str>) -> Result<String> {
        self.post_tweet(content, None).await
    }

    async fn verify_connection(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/users/me", self.base_url))
            .bearer_auth(self.config.authorization_token().expose())
            .send()
            .await;

        match response {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Twitter verify request failed");
                false
            }
        }
    }
}
