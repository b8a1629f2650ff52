//! Stub for platforms that are listed but have no publishing integration (TikTok)

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::platforms::PlatformAdapter;
use crate::types::Platform;

pub struct UnsupportedAdapter {
    platform: Platform,
}

impl UnsupportedAdapter {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl PlatformAdapter for UnsupportedAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn publish(&self, _content: &str, _media_url: Option<&str>) -> Result<String> {
        Err(PlatformError::Unsupported(self.platform).into())
    }

    async fn verify_connection(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tiktok_always_fails() {
        let adapter = UnsupportedAdapter::new(Platform::TikTok);
        let err = adapter.publish("hi", None).await.unwrap_err();
        assert_eq!(err.to_string(), "Platform error: unsupported platform: tiktok");
        assert!(!adapter.verify_connection().await);
    }
}
