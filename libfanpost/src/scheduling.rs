//! Due-post selection
//!
//! A post is due when it is `scheduled` and its time falls inside the
//! lookback window `[now - lookback, now]`. The window must be wider than
//! the trigger interval or a post can fall between two ticks; overlapping
//! ticks that see the same post are resolved by the claim in
//! [`Database::claim_post`].

use std::time::Duration;

use crate::db::Database;
use crate::error::Result;
use crate::types::Post;

#[derive(Clone)]
pub struct DuePostFinder {
    db: Database,
    lookback: Duration,
}

impl DuePostFinder {
    pub fn new(db: Database, lookback: Duration) -> Self {
        Self { db, lookback }
    }

    pub fn lookback(&self) -> Duration {
        self.lookback
    }

    /// Posts due at `now` (unix seconds), oldest first. Read-only.
    pub async fn find_due(&self, now: i64) -> Result<Vec<Post>> {
        let lookback_secs = i64::try_from(self.lookback.as_secs()).unwrap_or(i64::MAX);
        let posts = self.db.due_posts(now, lookback_secs).await?;

        tracing::debug!(now, lookback_secs, due = posts.len(), "Selected due posts");
        Ok(posts)
    }
}

/// True when the window cannot be trusted to cover the gap between ticks
pub fn window_too_narrow(lookback: Duration, trigger_interval: Duration) -> bool {
    lookback <= trigger_interval
}
