//! Instagram adapter (Graph API, two-phase container publish)

use async_trait::async_trait;

use crate::credentials::InstagramConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::{error_detail, id_at, json_body, truncate_chars, PlatformAdapter};
use crate::types::Platform;

pub const CAPTION_MAX_CHARS: usize = 2_200;

const ERROR_POINTERS: &[&str] = &["/error/message", "/error/error_user_msg"];

pub struct InstagramAdapter {
    client: reqwest::Client,
    base_url: String,
    config: InstagramConfig,
}

impl InstagramAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, config: InstagramConfig) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    fn account_url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.base_url, self.config.business_account_id, suffix)
    }

    /// POST a form and return the `id` of the response, naming `phase` on failure
    async fn phase(&self, phase: &'static str, url: String, form: &[(&str, &str)]) -> Result<String> {
        let failed = |detail: String| PlatformError::Phase {
            platform: Platform::Instagram,
            phase,
            detail,
        };

        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_detail(&body, ERROR_POINTERS)
            ))
            .into());
        }

        let json = json_body(Platform::Instagram, phase, response)
            .await
            .map_err(|e| failed(e.to_string()))?;
        id_at(&json, "/id").ok_or_else(|| failed("response did not include an id".to_string()).into())
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn publish(&self, content: &str, media_url: Option<&str>) -> Result<String> {
        let image_url = media_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                PlatformError::Validation("Instagram posts require a media URL".to_string())
            })?;
        let token = self.config.access_token.expose();

        let creation_id = self
            .phase(
                "create container",
                self.account_url("/media"),
                &[
                    ("image_url", image_url),
                    ("caption", truncate_chars(content, CAPTION_MAX_CHARS)),
                    ("access_token", token),
                ],
            )
            .await?;
        tracing::debug!(creation_id = %creation_id, "Created Instagram media container");

        self.phase(
            "publish",
            self.account_url("/media_publish"),
            &[("creation_id", creation_id.as_str()), ("access_token", token)],
        )
        .await
    }

    async fn verify_connection(&self) -> bool {
        let response = self
            .client
            .get(self.account_url(""))
            .query(&[
                ("fields", "id,username"),
                ("access_token", self.config.access_token.expose()),
            ])
            .send()
            .await;

        match response {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "Instagram verify request failed");
                false
            }
        }
    }
}
