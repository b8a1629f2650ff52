//! Publishing flows: the scheduled trigger tick and on-demand publish
//!
//! Both flows follow the same protocol: claim the post (compare-and-set to
//! `publishing`), resolve the owner's credentials, fan out through the
//! [`Dispatcher`], roll the results up and commit them with a
//! compare-and-set on the claim.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::DispatchSettings;
use crate::credentials;
use crate::db::{Claim, Database};
use crate::dispatcher::{Dispatcher, Publication};
use crate::error::{FanpostError, Result};
use crate::platforms::AdapterSource;
use crate::rollup::{roll_up, RetryPolicy, RollupOutcome};
use crate::scheduling::DuePostFinder;
use crate::types::{parse_platforms, DispatchBatch, PlatformResult, Post, PostStatus};

/// One post's line in a tick report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickEntry {
    pub post_id: String,
    /// The post's new status, or `"error"` when the post could not be dispatched
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub success: bool,
    pub processed: usize,
    pub results: Vec<TickEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    #[serde(default)]
    pub post_id: String,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub results: Vec<PlatformResult>,
    pub status: PostStatus,
}

#[derive(Clone)]
pub struct Publisher {
    db: Database,
    finder: DuePostFinder,
    dispatcher: Dispatcher,
    settings: DispatchSettings,
}

impl Publisher {
    pub fn new(db: Database, source: Arc<dyn AdapterSource>, settings: DispatchSettings) -> Self {
        Self {
            finder: DuePostFinder::new(db.clone(), settings.lookback),
            dispatcher: Dispatcher::new(source, settings.call_timeout),
            db,
            settings,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.settings.max_attempts,
        }
    }

    /// Process every post due at `now` (unix seconds).
    ///
    /// Stale claims are released first. Posts are handled one at a time; an
    /// error on one post is reported in its entry and does not stop the tick.
    /// Posts another run already claimed are skipped and left out of the
    /// report.
    pub async fn run_tick(&self, now: i64) -> Result<TickReport> {
        let lease_secs = i64::try_from(self.settings.lease_ttl.as_secs()).unwrap_or(i64::MAX);
        let released = self
            .db
            .release_stale_claims(now.saturating_sub(lease_secs))
            .await?;
        if released > 0 {
            warn!(released, "Released stale publishing claims");
        }

        let due = self.finder.find_due(now).await?;
        let mut results = Vec::with_capacity(due.len());

        for post in due {
            let post_id = post.id.clone();
            match self.process_due(post, now).await {
                Ok(Some(entry)) => results.push(entry),
                Ok(None) => debug!(post_id = %post_id, "Post already claimed, skipping"),
                Err(e) => {
                    warn!(post_id = %post_id, error = %e, "Failed to process due post");
                    results.push(TickEntry {
                        post_id,
                        status: "error".to_string(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(processed = results.len(), "Dispatch tick complete");
        Ok(TickReport {
            success: true,
            processed: results.len(),
            results,
        })
    }

    async fn process_due(&self, post: Post, now: i64) -> Result<Option<TickEntry>> {
        let Some(claim) = self.db.claim_post(&post.id, PostStatus::Scheduled, now).await? else {
            return Ok(None);
        };

        match credentials::resolve(&self.db, &post.user_id).await {
            Ok(creds) => {
                let batch = self
                    .dispatcher
                    .dispatch(publication_of(&post), &creds)
                    .await;
                let outcome = self
                    .commit(&post, &claim, PostStatus::Scheduled, &batch, now)
                    .await?;
                Ok(Some(TickEntry {
                    post_id: post.id,
                    status: outcome.status.to_string(),
                    error: None,
                }))
            }
            Err(e) => {
                // Fail closed: nothing is sent, every platform counts as not configured
                let batch = DispatchBatch {
                    post_id: post.id.clone(),
                    requested: post.platforms.clone(),
                    results: post
                        .platforms
                        .iter()
                        .map(|p| PlatformResult::not_configured(*p))
                        .collect(),
                };
                self.commit(&post, &claim, PostStatus::Scheduled, &batch, now)
                    .await?;
                Ok(Some(TickEntry {
                    post_id: post.id,
                    status: "error".to_string(),
                    error: Some(e.to_string()),
                }))
            }
        }
    }

    /// Roll a batch up and persist it against the claim
    async fn commit(
        &self,
        post: &Post,
        claim: &Claim,
        fallback: PostStatus,
        batch: &DispatchBatch,
        now: i64,
    ) -> Result<RollupOutcome> {
        let outcome = roll_up(batch, fallback, claim.attempts, self.policy(), now);

        if !self.db.commit_rollup(&post.id, claim, &outcome).await? {
            warn!(post_id = %post.id, "Claim lost before rollup commit");
            return Err(FanpostError::Conflict(format!(
                "post {} is no longer claimed by this run",
                post.id
            )));
        }

        if outcome.status == PostStatus::Failed {
            warn!(post_id = %post.id, attempts = outcome.attempts, "Post dead-lettered");
        } else {
            info!(
                post_id = %post.id,
                status = %outcome.status,
                published = ?outcome.published_platforms,
                "Post rolled up"
            );
        }

        Ok(outcome)
    }

    /// Publish a post now, on behalf of its owner.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for missing fields or unknown platforms, or platforms
    ///   the post does not target
    /// - `Config(CredentialsMissing)` when the owner has no credentials
    /// - `NotFound` when the post does not exist or belongs to someone else
    /// - `Conflict` when the post is being published or already published
    pub async fn publish_now(
        &self,
        user_id: &str,
        request: &PublishRequest,
        now: i64,
    ) -> Result<PublishResponse> {
        if request.post_id.trim().is_empty() || request.content.trim().is_empty() {
            return Err(FanpostError::InvalidInput(
                "Missing required fields: postId, platforms, content".to_string(),
            ));
        }
        let platforms = parse_platforms(&request.platforms)?;

        let post = self
            .db
            .get_post(&request.post_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| FanpostError::NotFound(format!("post {}", request.post_id)))?;

        if let Some(extra) = platforms.iter().find(|p| !post.platforms.contains(p)) {
            return Err(FanpostError::InvalidInput(format!(
                "Post {} does not target {}",
                post.id, extra
            )));
        }

        let prior = post.status;
        if matches!(
            prior,
            PostStatus::Publishing | PostStatus::Published | PostStatus::PartiallyPublished
        ) {
            return Err(FanpostError::Conflict(format!(
                "post {} is already {}",
                post.id, prior
            )));
        }

        let creds = credentials::resolve(&self.db, user_id).await?;

        let Some(claim) = self.db.claim_post(&post.id, prior, now).await? else {
            return Err(FanpostError::Conflict(format!(
                "post {} is already being published",
                post.id
            )));
        };

        let publication = Publication {
            post_id: &post.id,
            content: &request.content,
            media_url: request.media_url.as_deref(),
            platforms: &platforms,
        };
        let mut batch = self.dispatcher.dispatch(publication, &creds).await;
        let results = batch.results.clone();

        // Completeness is judged against everything the post targets
        batch.requested = post.platforms.clone();
        let outcome = self.commit(&post, &claim, prior, &batch, now).await?;

        Ok(PublishResponse {
            success: true,
            results,
            status: outcome.status,
        })
    }

    /// Move a draft (or dead-lettered) post onto the schedule.
    ///
    /// Rescheduling resets the attempt counter.
    pub async fn schedule(&self, user_id: &str, post_id: &str, at: i64) -> Result<()> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .filter(|p| p.user_id == user_id)
            .ok_or_else(|| FanpostError::NotFound(format!("post {}", post_id)))?;

        if !matches!(
            post.status,
            PostStatus::Draft | PostStatus::Scheduled | PostStatus::Failed
        ) {
            return Err(FanpostError::Conflict(format!(
                "post {} is already {}",
                post.id, post.status
            )));
        }

        if !self.db.schedule_post(post_id, post.status, at).await? {
            return Err(FanpostError::Conflict(format!(
                "post {} changed while scheduling",
                post.id
            )));
        }

        info!(post_id, scheduled_at = at, "Post scheduled");
        Ok(())
    }
}

fn publication_of(post: &Post) -> Publication<'_> {
    Publication {
        post_id: &post.id,
        content: &post.content,
        media_url: post.media_url.as_deref(),
        platforms: &post.platforms,
    }
}
