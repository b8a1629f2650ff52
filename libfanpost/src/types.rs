//! Core types for Fanpost

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{FanpostError, Result};

/// Maximum post length accepted from the authoring flow.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// A content destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "x")]
    Twitter,
    LinkedIn,
    Instagram,
    Discord,
    TikTok,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Twitter,
        Platform::LinkedIn,
        Platform::Instagram,
        Platform::Discord,
        Platform::TikTok,
    ];

    /// Platforms a user can connect credentials for.
    pub const CONNECTABLE: [Platform; 4] = [
        Platform::Twitter,
        Platform::LinkedIn,
        Platform::Instagram,
        Platform::Discord,
    ];

    /// Lowercase wire name (e.g. "linkedin")
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::Instagram => "instagram",
            Platform::Discord => "discord",
            Platform::TikTok => "tiktok",
        }
    }

    /// Human-readable name for log lines and error messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter",
            Platform::LinkedIn => "LinkedIn",
            Platform::Instagram => "Instagram",
            Platform::Discord => "Discord",
            Platform::TikTok => "TikTok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = FanpostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::LinkedIn),
            "instagram" => Ok(Platform::Instagram),
            "discord" => Ok(Platform::Discord),
            "tiktok" => Ok(Platform::TikTok),
            other => Err(FanpostError::InvalidInput(format!(
                "Unknown platform '{}'. Valid options: twitter, linkedin, instagram, discord, tiktok",
                other
            ))),
        }
    }
}

/// Parse a requested platform list, rejecting empty lists, unknown names and duplicates.
pub fn parse_platforms<S: AsRef<str>>(names: &[S]) -> Result<Vec<Platform>> {
    if names.is_empty() {
        return Err(FanpostError::InvalidInput(
            "At least one platform is required".to_string(),
        ));
    }

    let mut platforms = Vec::with_capacity(names.len());
    for name in names {
        let platform: Platform = name.as_ref().parse()?;
        if platforms.contains(&platform) {
            return Err(FanpostError::InvalidInput(format!(
                "Platform '{}' requested more than once",
                platform
            )));
        }
        platforms.push(platform);
    }
    Ok(platforms)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    /// Claimed by a dispatcher run; see `Database::claim_post`.
    Publishing,
    Published,
    PartiallyPublished,
    /// Dead letter: every attempt failed and the retry budget is spent.
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::PartiallyPublished => "partially_published",
            PostStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = FanpostError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "published" => Ok(PostStatus::Published),
            "partially_published" => Ok(PostStatus::PartiallyPublished),
            "failed" => Ok(PostStatus::Failed),
            other => Err(FanpostError::InvalidInput(format!(
                "Unknown post status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub platforms: Vec<Platform>,
    pub media_url: Option<String>,
    pub scheduled_at: Option<i64>,
    pub status: PostStatus,
    pub published_platforms: Vec<Platform>,
    pub published_at: Option<i64>,
    pub attempts: u32,
    pub claimed_at: Option<i64>,
    pub created_at: i64,
}

impl Post {
    /// Create a draft post
    pub fn new(user_id: impl Into<String>, content: impl Into<String>, platforms: Vec<Platform>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            content: content.into(),
            platforms,
            media_url: None,
            scheduled_at: None,
            status: PostStatus::Draft,
            published_platforms: Vec::new(),
            published_at: None,
            attempts: 0,
            claimed_at: None,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Mark the post as scheduled for `at` (unix seconds)
    pub fn scheduled_for(mut self, at: i64) -> Self {
        self.scheduled_at = Some(at);
        self.status = PostStatus::Scheduled;
        self
    }

    pub fn with_media(mut self, media_url: impl Into<String>) -> Self {
        self.media_url = Some(media_url.into());
        self
    }

    /// Check the authoring invariants before a post is stored.
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(FanpostError::InvalidInput(
                "Content cannot be empty".to_string(),
            ));
        }
        let chars = self.content.chars().count();
        if chars > MAX_CONTENT_CHARS {
            return Err(FanpostError::InvalidInput(format!(
                "Content exceeds {} character limit (got {} characters)",
                MAX_CONTENT_CHARS, chars
            )));
        }
        if self.platforms.is_empty() {
            return Err(FanpostError::InvalidInput(
                "At least one platform is required".to_string(),
            ));
        }
        let names: Vec<&str> = self.platforms.iter().map(Platform::as_str).collect();
        parse_platforms(&names)?;
        if self
            .published_platforms
            .iter()
            .any(|p| !self.platforms.contains(p))
        {
            return Err(FanpostError::InvalidInput(
                "Published platforms must be a subset of requested platforms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one platform attempt within a dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: Platform,
    pub success: bool,
    /// Remote identifier returned by the platform
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformResult {
    pub fn success(platform: Platform, remote_id: impl Into<String>) -> Self {
        Self {
            platform,
            success: true,
            remote_id: Some(remote_id.into()),
            error: None,
        }
    }

    pub fn failure(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            platform,
            success: false,
            remote_id: None,
            error: Some(error.into()),
        }
    }

    pub fn not_configured(platform: Platform) -> Self {
        Self::failure(
            platform,
            crate::error::ConfigError::NotConfigured(platform).to_string(),
        )
    }
}

/// One post plus the results collected for a single dispatch attempt
#[derive(Debug, Clone)]
pub struct DispatchBatch {
    pub post_id: String,
    pub requested: Vec<Platform>,
    pub results: Vec<PlatformResult>,
}

impl DispatchBatch {
    /// Requested platforms that reported success, in request order
    pub fn succeeded(&self) -> Vec<Platform> {
        self.requested
            .iter()
            .copied()
            .filter(|p| self.results.iter().any(|r| r.platform == *p && r.success))
            .collect()
    }
}
