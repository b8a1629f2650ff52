//! Platform adapters
//!
//! Each adapter wraps one platform's publish and verify protocol behind
//! [`PlatformAdapter`]. Adapters are built from exactly one credential slice
//! by an [`AdapterSource`]; [`HttpAdapters`] is the production registry.
//!
//! # Examples
//!
//! ```no_run
//! use libfanpost::config::Endpoints;
//! use libfanpost::credentials::{Credentials, DiscordConfig};
//! use libfanpost::platforms::{AdapterSource, HttpAdapters};
//! use libfanpost::Platform;
//!
//! # async fn example() -> libfanpost::error::Result<()> {
//! let adapters = HttpAdapters::new(Endpoints::default())?;
//!
//! let mut credentials = Credentials::new("user-1");
//! credentials.discord = Some(DiscordConfig {
//!     webhook_url: Some("https://discord.com/api/webhooks/1/abc".to_string()),
//!     ..Default::default()
//! });
//!
//! let discord = adapters.select(Platform::Discord, &credentials)?;
//! let remote_id = discord.publish("Hello from fanpost", None).await?;
//! println!("Posted: {}", remote_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Endpoints;
use crate::credentials::{Credentials, PlatformConfig};
use crate::error::{ConfigError, PlatformError, Result};
use crate::types::Platform;

pub mod discord;
pub mod instagram;
pub mod linkedin;
pub mod twitter;
pub mod unsupported;

// Available outside tests so integration tests and downstream crates can use it
pub mod mock;

pub use discord::DiscordAdapter;
pub use instagram::InstagramAdapter;
pub use linkedin::LinkedInAdapter;
pub use twitter::TwitterAdapter;
pub use unsupported::UnsupportedAdapter;

/// One platform's publish/verify protocol
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Publish `content` and return the platform's identifier for the new post.
    ///
    /// # Errors
    ///
    /// Returns a `PlatformError` carrying the platform's error detail on any
    /// non-success response or transport failure, or a `ConfigError` when the
    /// credential slice cannot support publishing at all.
    async fn publish(&self, content: &str, media_url: Option<&str>) -> Result<String>;

    /// Check that the stored credentials still work. Never fails; any
    /// transport or authentication problem reports `false`.
    async fn verify_connection(&self) -> bool;
}

/// Builds adapters from credential slices
pub trait AdapterSource: Send + Sync {
    fn build(&self, config: PlatformConfig<'_>) -> Box<dyn PlatformAdapter>;

    /// Pick the adapter for `platform`.
    ///
    /// Fails with [`ConfigError::NotConfigured`] when the user has no slice
    /// for the platform. TikTok has no slice and always gets the stub.
    fn select(&self, platform: Platform, credentials: &Credentials) -> Result<Box<dyn PlatformAdapter>> {
        if platform == Platform::TikTok {
            return Ok(Box::new(UnsupportedAdapter::new(platform)));
        }

        let config = credentials
            .config_for(platform)
            .ok_or(ConfigError::NotConfigured(platform))?;
        Ok(self.build(config))
    }
}

/// Production registry: one shared HTTP client plus the API base URLs
#[derive(Debug, Clone)]
pub struct HttpAdapters {
    client: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpAdapters {
    pub fn new(endpoints: Endpoints) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fanpost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, endpoints))
    }

    pub fn with_client(client: reqwest::Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

impl AdapterSource for HttpAdapters {
    fn build(&self, config: PlatformConfig<'_>) -> Box<dyn PlatformAdapter> {
        let client = self.client.clone();
        match config {
            PlatformConfig::Twitter(c) => Box::new(TwitterAdapter::new(
                client,
                &self.endpoints.twitter,
                c.clone(),
            )),
            PlatformConfig::LinkedIn(c) => Box::new(LinkedInAdapter::new(
                client,
                &self.endpoints.linkedin,
                c.clone(),
            )),
            PlatformConfig::Instagram(c) => Box::new(InstagramAdapter::new(
                client,
                &self.endpoints.instagram,
                c.clone(),
            )),
            PlatformConfig::Discord(c) => Box::new(DiscordAdapter::new(
                client,
                &self.endpoints.discord,
                c.clone(),
            )),
        }
    }
}

/// Longest prefix of `text` holding at most `max` characters.
///
/// Counts Unicode scalar values, so a multi-byte character is never split.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Pull a human-readable error out of a response body.
///
/// Tries each JSON pointer in order and falls back to the raw body.
pub(crate) fn error_detail(body: &str, pointers: &[&str]) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for pointer in pointers {
            if let Some(text) = json.pointer(pointer).and_then(Value::as_str) {
                return text.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turn a non-success response into a `PlatformError`, passing successes through
pub(crate) async fn ensure_success(
    platform: Platform,
    response: reqwest::Response,
    pointers: &[&str],
) -> std::result::Result<reqwest::Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(PlatformError::from_status(
        platform,
        status,
        &error_detail(&body, pointers),
    ))
}

/// Read a JSON body; an empty body reads as `Value::Null`
pub(crate) async fn json_body(
    platform: Platform,
    context: &str,
    response: reqwest::Response,
) -> std::result::Result<Value, PlatformError> {
    let text = response
        .text()
        .await
        .map_err(|e| PlatformError::from_transport(platform, context, e))?;

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&text).map_err(|e| {
        PlatformError::Posting(format!(
            "{} returned invalid JSON during {}: {}",
            platform.display_name(),
            context,
            e
        ))
    })
}

/// String or numeric `id` field at `pointer`
pub(crate) fn id_at(json: &Value, pointer: &str) -> Option<String> {
    match json.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
