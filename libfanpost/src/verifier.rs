//! Connection verification
//!
//! Checks every connectable platform independently and concurrently. A
//! platform without a credential slice reports `false` without any network
//! call. Discord's adapter probes the webhook URL first when one is stored.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::credentials::Credentials;
use crate::platforms::AdapterSource;
use crate::types::Platform;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub twitter: bool,
    pub linkedin: bool,
    pub instagram: bool,
    pub discord: bool,
}

impl ConnectionStatus {
    fn set(&mut self, platform: Platform, connected: bool) {
        match platform {
            Platform::Twitter => self.twitter = connected,
            Platform::LinkedIn => self.linkedin = connected,
            Platform::Instagram => self.instagram = connected,
            Platform::Discord => self.discord = connected,
            Platform::TikTok => {}
        }
    }

    pub fn get(&self, platform: Platform) -> bool {
        match platform {
            Platform::Twitter => self.twitter,
            Platform::LinkedIn => self.linkedin,
            Platform::Instagram => self.instagram,
            Platform::Discord => self.discord,
            Platform::TikTok => false,
        }
    }
}

#[derive(Clone)]
pub struct ConnectionVerifier {
    source: Arc<dyn AdapterSource>,
    call_timeout: Duration,
}

impl ConnectionVerifier {
    pub fn new(source: Arc<dyn AdapterSource>, call_timeout: Duration) -> Self {
        Self {
            source,
            call_timeout,
        }
    }

    /// Verify each connectable platform. Missing credentials report all `false`.
    pub async fn verify(&self, credentials: Option<&Credentials>) -> ConnectionStatus {
        let mut status = ConnectionStatus::default();
        let Some(credentials) = credentials else {
            return status;
        };

        let checks = Platform::CONNECTABLE
            .into_iter()
            .map(|platform| async move { (platform, self.check(platform, credentials).await) });

        for (platform, connected) in join_all(checks).await {
            status.set(platform, connected);
        }

        tracing::debug!(user_id = %credentials.user_id, ?status, "Verified connections");
        status
    }

    async fn check(&self, platform: Platform, credentials: &Credentials) -> bool {
        let Some(config) = credentials.config_for(platform) else {
            return false;
        };

        let adapter = self.source.build(config);
        match tokio::time::timeout(self.call_timeout, adapter.verify_connection()).await {
            Ok(connected) => connected,
            Err(_) => {
                tracing::debug!(platform = %platform, "Verify timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{DiscordConfig, LinkedInConfig, Token};
    use crate::platforms::mock::{MockAdapter, MockAdapters};

    #[tokio::test]
    async fn test_missing_credentials_all_false() {
        let verifier = ConnectionVerifier::new(Arc::new(MockAdapters::new()), Duration::from_secs(1));
        assert_eq!(verifier.verify(None).await, ConnectionStatus::default());
    }

    #[tokio::test]
    async fn test_each_platform_checked_independently() {
        let mocks = MockAdapters::new()
            .with(MockAdapter::success(Platform::Discord, "d1"))
            .with(MockAdapter::failure(Platform::LinkedIn, "expired"))
            .with(MockAdapter::success(Platform::Twitter, "t1"));
        let verifier = ConnectionVerifier::new(Arc::new(mocks), Duration::from_secs(1));

        let mut credentials = Credentials::new("user-1");
        credentials.discord = Some(DiscordConfig::default());
        credentials.linkedin = Some(LinkedInConfig {
            access_token: Token::new("li"),
            organization_id: None,
            visibility: None,
        });

        let status = verifier.verify(Some(&credentials)).await;
        assert!(status.discord);
        assert!(!status.linkedin);
        // Registered but not connected: never checked
        assert!(!status.twitter);
        assert!(!status.instagram);
    }

    #[tokio::test]
    async fn test_slow_verify_reports_false() {
        let mocks = MockAdapters::new().with(
            MockAdapter::success(Platform::Discord, "d1").with_delay(Duration::from_secs(5)),
        );
        let verifier = ConnectionVerifier::new(Arc::new(mocks), Duration::from_millis(50));

        let mut credentials = Credentials::new("user-1");
        credentials.discord = Some(DiscordConfig::default());

        assert!(!verifier.verify(Some(&credentials)).await.discord);
    }

    #[test]
    fn test_status_serializes_flat() {
        let status = ConnectionStatus {
            discord: true,
            ..Default::default()
        };
        let value = serde_json::to_value(status).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"twitter": false, "linkedin": false, "instagram": false, "discord": true})
        );
    }
}
