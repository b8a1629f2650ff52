//! Fan-out engine
//!
//! Runs one adapter per requested platform concurrently and collects exactly
//! one [`PlatformResult`] per platform, in request order. Every call is
//! bounded by its own timeout; a failing or slow platform never cancels or
//! delays the others beyond that bound.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::credentials::Credentials;
use crate::error::{FanpostError, PlatformError};
use crate::platforms::AdapterSource;
use crate::types::{DispatchBatch, Platform, PlatformResult};

/// What to publish, independent of where it is stored
#[derive(Debug, Clone, Copy)]
pub struct Publication<'a> {
    pub post_id: &'a str,
    pub content: &'a str,
    pub media_url: Option<&'a str>,
    pub platforms: &'a [Platform],
}

#[derive(Clone)]
pub struct Dispatcher {
    source: Arc<dyn AdapterSource>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(source: Arc<dyn AdapterSource>, call_timeout: Duration) -> Self {
        Self {
            source,
            call_timeout,
        }
    }

    pub fn source(&self) -> &Arc<dyn AdapterSource> {
        &self.source
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Publish to every requested platform and wait for all of them.
    ///
    /// Platforms without a credential slice fail immediately with a
    /// "not configured" result and no network I/O.
    pub async fn dispatch(
        &self,
        publication: Publication<'_>,
        credentials: &Credentials,
    ) -> DispatchBatch {
        info!(
            post_id = publication.post_id,
            platforms = ?publication.platforms,
            "Dispatching post"
        );

        let attempts = publication
            .platforms
            .iter()
            .map(|&platform| self.publish_one(platform, publication, credentials));
        let results = join_all(attempts).await;

        for result in results.iter().filter(|r| !r.success) {
            warn!(
                post_id = publication.post_id,
                platform = %result.platform,
                error = result.error.as_deref().unwrap_or("unknown error"),
                "Platform publish failed"
            );
        }

        DispatchBatch {
            post_id: publication.post_id.to_string(),
            requested: publication.platforms.to_vec(),
            results,
        }
    }

    async fn publish_one(
        &self,
        platform: Platform,
        publication: Publication<'_>,
        credentials: &Credentials,
    ) -> PlatformResult {
        let adapter = match self.source.select(platform, credentials) {
            Ok(adapter) => adapter,
            Err(e) => return PlatformResult::failure(platform, failure_message(&e)),
        };

        let call = adapter.publish(publication.content, publication.media_url);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(remote_id)) => {
                info!(
                    post_id = publication.post_id,
                    platform = %platform,
                    remote_id = %remote_id,
                    "Published"
                );
                PlatformResult::success(platform, remote_id)
            }
            Ok(Err(e)) => PlatformResult::failure(platform, failure_message(&e)),
            Err(_) => PlatformResult::failure(
                platform,
                PlatformError::Timeout {
                    platform,
                    seconds: self.call_timeout.as_secs(),
                }
                .to_string(),
            ),
        }
    }
}

/// Error text for a result slot, without the top-level category prefix
fn failure_message(error: &FanpostError) -> String {
    match error {
        FanpostError::Platform(e) => e.to_string(),
        FanpostError::Config(e) => e.to_string(),
        other => other.to_string(),
    }
}
