//! Mock adapters for testing
//!
//! [`MockAdapter`] simulates one platform with a configurable outcome,
//! latency and verify result, and records every publish call. [`MockAdapters`]
//! is an [`AdapterSource`] that hands out those mocks instead of HTTP
//! adapters, so dispatcher and publisher flows can be tested without network
//! access. Clones share their counters.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::credentials::PlatformConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::{AdapterSource, PlatformAdapter};
use crate::types::Platform;

/// Configuration for mock adapter behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: Platform,

    /// Remote id returned on success; `None` fails the publish
    pub remote_id: Option<String>,

    /// Error returned when publishing fails
    pub error: String,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,

    /// Result of `verify_connection`
    pub verifies: bool,

    /// Number of times publish has been called
    pub publish_calls: Arc<Mutex<usize>>,

    /// Content passed to publish, in call order
    pub published_content: Arc<Mutex<Vec<String>>>,
}

impl MockConfig {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            remote_id: Some(format!("{}-mock", platform)),
            error: "Mock publish failed".to_string(),
            delay: Duration::ZERO,
            verifies: true,
            publish_calls: Arc::new(Mutex::new(0)),
            published_content: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockAdapter {
    config: MockConfig,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self { config }
    }

    /// A mock that publishes successfully with the given remote id
    pub fn success(platform: Platform, remote_id: &str) -> Self {
        Self::new(MockConfig {
            remote_id: Some(remote_id.to_string()),
            ..MockConfig::new(platform)
        })
    }

    /// A mock whose publish fails with `error` and whose verify reports false
    pub fn failure(platform: Platform, error: &str) -> Self {
        Self::new(MockConfig {
            remote_id: None,
            error: error.to_string(),
            verifies: false,
            ..MockConfig::new(platform)
        })
    }

    /// Add latency to publish and verify
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn publish_calls(&self) -> usize {
        *self.config.publish_calls.lock().unwrap()
    }

    pub fn published_content(&self) -> Vec<String> {
        self.config.published_content.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    async fn publish(&self, content: &str, _media_url: Option<&str>) -> Result<String> {
        *self.config.publish_calls.lock().unwrap() += 1;

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        match &self.config.remote_id {
            Some(id) => {
                self.config
                    .published_content
                    .lock()
                    .unwrap()
                    .push(content.to_string());
                Ok(id.clone())
            }
            None => Err(PlatformError::Posting(self.config.error.clone()).into()),
        }
    }

    async fn verify_connection(&self) -> bool {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
        self.config.verifies
    }
}

/// Registry of mocks keyed by platform.
///
/// A configured platform without a registered mock gets a failing mock, so
/// tests never reach the network by accident.
#[derive(Debug, Clone, Default)]
pub struct MockAdapters {
    adapters: HashMap<Platform, MockAdapter>,
}

impl MockAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, adapter: MockAdapter) -> Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&MockAdapter> {
        self.adapters.get(&platform)
    }

    /// Total publish calls across every registered mock
    pub fn total_publish_calls(&self) -> usize {
        self.adapters.values().map(MockAdapter::publish_calls).sum()
    }
}

impl AdapterSource for MockAdapters {
    fn build(&self, config: PlatformConfig<'_>) -> Box<dyn PlatformAdapter> {
        let platform = config.platform();
        match self.adapters.get(&platform) {
            Some(adapter) => Box::new(adapter.clone()),
            None => Box::new(MockAdapter::failure(platform, "no mock registered")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, DiscordConfig};

    #[tokio::test]
    async fn test_mock_success_records_content() {
        let mock = MockAdapter::success(Platform::Twitter, "t1");
        assert_eq!(mock.publish("hello", None).await.unwrap(), "t1");
        assert_eq!(mock.publish_calls(), 1);
        assert_eq!(mock.published_content(), vec!["hello".to_string()]);
        assert!(mock.verify_connection().await);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockAdapter::failure(Platform::Discord, "Unknown Webhook");
        let err = mock.publish("hello", None).await.unwrap_err();
        assert!(err.to_string().contains("Unknown Webhook"));
        assert_eq!(mock.publish_calls(), 1);
        assert!(mock.published_content().is_empty());
        assert!(!mock.verify_connection().await);
    }

    #[tokio::test]
    async fn test_clones_share_counters() {
        let mocks = MockAdapters::new().with(MockAdapter::success(Platform::Discord, "d1"));
        let mut credentials = Credentials::new("u");
        credentials.discord = Some(DiscordConfig::default());

        let adapter = mocks.select(Platform::Discord, &credentials).unwrap();
        adapter.publish("x", None).await.unwrap();
        adapter.publish("y", None).await.unwrap();

        assert_eq!(mocks.get(Platform::Discord).unwrap().publish_calls(), 2);
        assert_eq!(mocks.total_publish_calls(), 2);
    }

    #[tokio::test]
    async fn test_delay_is_applied() {
        let mock = MockAdapter::success(Platform::Twitter, "t1").with_delay(Duration::from_millis(50));
        let start = std::time::Instant::now();
        mock.publish("slow", None).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
