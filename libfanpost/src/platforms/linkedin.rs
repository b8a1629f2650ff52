//! LinkedIn adapter (UGC posts API)
//!
//! Member posts need the member's `sub` from `/userinfo` first; company page
//! posts are addressed to the organization URN and skip that call.

use async_trait::async_trait;
use serde_json::json;

use crate::credentials::{LinkedInConfig, Visibility};
use crate::error::{PlatformError, Result};
use crate::platforms::{ensure_success, id_at, json_body, PlatformAdapter};
use crate::types::Platform;

const RESTLI_VERSION: &str = "2.0.0";
const ERROR_POINTERS: &[&str] = &["/message", "/error_description", "/error"];

pub struct LinkedInAdapter {
    client: reqwest::Client,
    base_url: String,
    config: LinkedInConfig,
}

impl LinkedInAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, config: LinkedInConfig) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    async fn userinfo(&self) -> std::result::Result<reqwest::Response, reqwest::Error> {
        self.client
            .get(format!("{}/userinfo", self.base_url))
            .bearer_auth(self.config.access_token.expose())
            .send()
            .await
    }

    /// Author URN and visibility for the next post
    async fn author(&self) -> Result<(String, Visibility)> {
        if let Some(org) = self.config.organization_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok((format!("urn:li:organization:{}", org), Visibility::Public));
        }

        let response = self
            .userinfo()
            .await
            .map_err(|e| PlatformError::from_transport(Platform::LinkedIn, "userinfo", e))?;
        let response = ensure_success(Platform::LinkedIn, response, ERROR_POINTERS).await?;
        let json = json_body(Platform::LinkedIn, "userinfo", response).await?;

        let sub = json
            .get("sub")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PlatformError::Authentication("LinkedIn userinfo did not include sub".to_string())
            })?;

        Ok((
            format!("urn:li:person:{}", sub),
            self.config.visibility.unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl PlatformAdapter for LinkedInAdapter {
    fn platform(&self) -> Platform {
        Platform::LinkedIn
    }

    async fn publish(&self, content: &str, _media_url: Option<&str>) -> Result<String> {
        let (author, visibility) = self.author().await?;

        let body = json!({
            "author": author,
            "lifecycleState": "PUBLISHED",
            "specificContent": {
                "com.linkedin.ugc.ShareContent": {
                    "shareCommentary": { "text": content },
                    "shareMediaCategory": "NONE"
                }
            },
            "visibility": {
                "com.linkedin.ugc.MemberNetworkVisibility": visibility.as_str()
            }
        });

        let response = self
            .client
            .post(format!("{}/ugcPosts", self.base_url))
            .bearer_auth(self.config.access_token.expose())
            .header("X-Restli-Protocol-Version", RESTLI_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::from_transport(Platform::LinkedIn, "ugcPosts", e))?;

        let response = ensure_success(Platform::LinkedIn, response, ERROR_POINTERS).await?;
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let json = json_body(Platform::LinkedIn, "ugcPosts", response).await?;

        id_at(&json, "/id").or(header_id).ok_or_else(|| {
            PlatformError::Posting("LinkedIn response did not include a post id".to_string())
                .into()
        })
    }

    async fn verify_connection(&self) -> bool {
        match self.userinfo().await {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "LinkedIn verify request failed");
                false
            }
        }
    }
}
