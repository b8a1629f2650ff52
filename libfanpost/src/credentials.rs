//! Per-user platform credentials
//!
//! Each user has at most one [`Credentials`] record holding an optional,
//! platform-specific configuration per platform. A present configuration is
//! the only signal that the user connected that platform. Adapters are built
//! from exactly one slice (see [`PlatformConfig`]), so a Twitter token can
//! never reach the LinkedIn adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::Database;
use crate::error::{ConfigError, Result};
use crate::types::Platform;

/// An API secret. Serializes transparently; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwitterConfig {
    pub api_key: Token,
    pub api_secret: Token,
    pub access_token: Token,
    pub access_token_secret: Token,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<Token>,
}

impl TwitterConfig {
    /// The token sent as `Authorization: Bearer`; a dedicated bearer token wins.
    pub fn authorization_token(&self) -> &Token {
        match &self.bearer_token {
            Some(token) if !token.is_blank() => token,
            _ => &self.access_token,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Connections,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "PUBLIC",
            Visibility::Connections => "CONNECTIONS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInConfig {
    pub access_token: Token,
    /// Post as this company page instead of the authenticated member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramConfig {
    pub access_token: Token,
    #[serde(alias = "instagramBusinessAccountId")]
    pub business_account_id: String,
    #[serde(default)]
    pub page_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl DiscordConfig {
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Borrowed view of one platform's configuration slice
#[derive(Debug, Clone, Copy)]
pub enum PlatformConfig<'a> {
    Twitter(&'a TwitterConfig),
    LinkedIn(&'a LinkedInConfig),
    Instagram(&'a InstagramConfig),
    Discord(&'a DiscordConfig),
}

impl PlatformConfig<'_> {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformConfig::Twitter(_) => Platform::Twitter,
            PlatformConfig::LinkedIn(_) => Platform::LinkedIn,
            PlatformConfig::Instagram(_) => Platform::Instagram,
            PlatformConfig::Discord(_) => Platform::Discord,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user_id: String,
    #[serde(default)]
    pub twitter: Option<TwitterConfig>,
    #[serde(default)]
    pub linkedin: Option<LinkedInConfig>,
    #[serde(default)]
    pub instagram: Option<InstagramConfig>,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// The configuration slice for `platform`, if the user connected it.
    pub fn config_for(&self, platform: Platform) -> Option<PlatformConfig<'_>> {
        match platform {
            Platform::Twitter => self.twitter.as_ref().map(PlatformConfig::Twitter),
            Platform::LinkedIn => self.linkedin.as_ref().map(PlatformConfig::LinkedIn),
            Platform::Instagram => self.instagram.as_ref().map(PlatformConfig::Instagram),
            Platform::Discord => self.discord.as_ref().map(PlatformConfig::Discord),
            Platform::TikTok => None,
        }
    }

    pub fn is_connected(&self, platform: Platform) -> bool {
        self.config_for(platform).is_some()
    }

    /// Connected platforms in canonical order
    pub fn connected(&self) -> Vec<Platform> {
        Platform::CONNECTABLE
            .into_iter()
            .filter(|p| self.is_connected(*p))
            .collect()
    }
}

/// Load a user's credentials, failing closed when none exist.
///
/// This is a local lookup; it is never retried.
pub async fn resolve(db: &Database, user_id: &str) -> Result<Credentials> {
    match db.get_credentials(user_id).await? {
        Some(credentials) => {
            tracing::debug!(
                user_id,
                connected = ?credentials.connected(),
                "Resolved credentials"
            );
            Ok(credentials)
        }
        None => Err(ConfigError::CredentialsMissing(user_id.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn twitter(bearer: Option<&str>) -> TwitterConfig {
        TwitterConfig {
            api_key: "key".into(),
            api_secret: "secret".into(),
            access_token: "access".into(),
            access_token_secret: "access-secret".into(),
            bearer_token: bearer.map(Token::from),
        }
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::new("super-secret");
        assert_eq!(format!("{:?}", token), "Token(***)");
        let config = twitter(Some("bearer-secret"));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("bearer-secret"));
        assert!(!debug.contains("access-secret"));
    }

    #[test]
    fn test_twitter_prefers_bearer_token() {
        assert_eq!(twitter(Some("bearer")).authorization_token().expose(), "bearer");
        assert_eq!(twitter(None).authorization_token().expose(), "access");
        assert_eq!(twitter(Some("  ")).authorization_token().expose(), "access");
    }

    #[test]
    fn test_config_for_only_returns_own_slice() {
        let mut credentials = Credentials::new("user-1");
        credentials.twitter = Some(twitter(None));

        match credentials.config_for(Platform::Twitter) {
            Some(PlatformConfig::Twitter(config)) => {
                assert_eq!(config.access_token.expose(), "access")
            }
            other => panic!("Expected twitter slice, got {:?}", other),
        }
        assert!(credentials.config_for(Platform::LinkedIn).is_none());
        assert!(credentials.config_for(Platform::TikTok).is_none());
        assert_eq!(credentials.connected(), vec![Platform::Twitter]);
    }

    #[test]
    fn test_deserialize_camel_case_blobs() {
        let discord: DiscordConfig =
            serde_json::from_str(r#"{"webhookUrl": "https://discord.test/hook"}"#).unwrap();
        assert_eq!(discord.webhook(), Some("https://discord.test/hook"));
        assert!(discord.bot_token.is_none());

        let instagram: InstagramConfig = serde_json::from_str(
            r#"{"accessToken": "t", "instagramBusinessAccountId": "178", "pageId": "9"}"#,
        )
        .unwrap();
        assert_eq!(instagram.business_account_id, "178");

        let linkedin: LinkedInConfig =
            serde_json::from_str(r#"{"accessToken": "t", "visibility": "CONNECTIONS"}"#).unwrap();
        assert_eq!(linkedin.visibility, Some(Visibility::Connections));
    }

    #[test]
    fn test_blank_webhook_is_not_a_webhook() {
        let discord = DiscordConfig {
            webhook_url: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(discord.webhook(), None);
    }
}
