//! Status rollup: turn one dispatch batch into the post's next state
//!
//! ```text
//! draft ──► scheduled ──► publishing ──┬─► published            (k = N)
//!                ▲                     ├─► partially_published  (0 < k < N)
//!                └─────────────────────┤   scheduled            (k = 0, attempts left)
//!                                      └─► failed               (k = 0, retry budget spent)
//! ```
//!
//! `k` counts requested platforms that reported success. The result is a
//! pure value; `Database::commit_rollup` persists it.

use crate::types::{DispatchBatch, Platform, PostStatus};

/// Bounded retry for posts where every platform failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupOutcome {
    pub status: PostStatus,
    /// Always a subset of the batch's requested platforms, in request order
    pub published_platforms: Vec<Platform>,
    /// Set only when the post moved to a published state
    pub published_at: Option<i64>,
    pub attempts: u32,
}

impl RollupOutcome {
    pub fn is_published(&self) -> bool {
        matches!(
            self.status,
            PostStatus::Published | PostStatus::PartiallyPublished
        )
    }
}

/// Derive the post's next state from one batch.
///
/// `fallback` is the status the post had before it was claimed; a batch with
/// no successes returns the post to it. Scheduled posts are dead-lettered as
/// `failed` once `prior_attempts + 1` reaches the policy's limit.
pub fn roll_up(
    batch: &DispatchBatch,
    fallback: PostStatus,
    prior_attempts: u32,
    policy: RetryPolicy,
    now: i64,
) -> RollupOutcome {
    let published_platforms = batch.succeeded();
    let attempts = prior_attempts.saturating_add(1);

    let status = if !batch.requested.is_empty() && published_platforms.len() == batch.requested.len() {
        PostStatus::Published
    } else if !published_platforms.is_empty() {
        PostStatus::PartiallyPublished
    } else if fallback == PostStatus::Scheduled && attempts >= policy.max_attempts {
        PostStatus::Failed
    } else {
        fallback
    };

    let published_at = matches!(
        status,
        PostStatus::Published | PostStatus::PartiallyPublished
    )
    .then_some(now);

    RollupOutcome {
        status,
        published_platforms,
        published_at,
        attempts,
    }
}
