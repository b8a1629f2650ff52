//! Database operations for Fanpost

use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::credentials::Credentials;
use crate::error::{DbError, Result};
use crate::rollup::RollupOutcome;
use crate::types::{Platform, Post, PostStatus};

/// A run's hold on a post in `publishing`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub token: String,
    /// Attempts recorded on the post when it was claimed
    pub attempts: u32,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

const POST_COLUMNS: &str = "id, user_id, content, platforms, media_url, scheduled_at, status, \
     published_platforms, published_at, attempts, claimed_at, created_at";

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let pool = if db_path == ":memory:" {
            // Every pooled connection would otherwise see its own empty database
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await
                .map_err(DbError::SqlxError)?
        } else {
            let expanded_path = shellexpand::tilde(db_path).to_string();
            let path = Path::new(&expanded_path);

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }

            // mode=rwc creates the file on first use
            let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));
            SqlitePool::connect(&db_url)
                .await
                .map_err(DbError::SqlxError)?
        };

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Store a new post (authoring flow and tests)
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        post.validate()?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, content, platforms, media_url, scheduled_at, status,
                               published_platforms, published_at, attempts, claimed_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.content)
        .bind(encode_platforms(&post.platforms)?)
        .bind(&post.media_url)
        .bind(post.scheduled_at)
        .bind(post.status.as_str())
        .bind(encode_platforms(&post.published_platforms)?)
        .bind(post.published_at)
        .bind(i64::from(post.attempts))
        .bind(post.claimed_at)
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(post_from_row).transpose()
    }

    /// Scheduled posts with `scheduled_at` in `[now - lookback_secs, now]`, oldest first
    pub async fn due_posts(&self, now: i64, lookback_secs: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM posts
            WHERE status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at >= ?
              AND scheduled_at <= ?
            ORDER BY scheduled_at ASC, created_at ASC
            "#,
            POST_COLUMNS
        ))
        .bind(now - lookback_secs)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(post_from_row).collect()
    }

    /// Atomically move a post from `expected` to `publishing`.
    ///
    /// Returns `None` when the post is missing or no longer in `expected`,
    /// i.e. another run already owns it. The returned [`Claim`] carries the
    /// token the rollup commit must present and the attempt count as of the
    /// claim.
    pub async fn claim_post(
        &self,
        post_id: &str,
        expected: PostStatus,
        now: i64,
    ) -> Result<Option<Claim>> {
        let token = uuid::Uuid::new_v4().to_string();
        let row = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'publishing', claimed_at = ?, claimed_from = status, claim_token = ?
            WHERE id = ? AND status = ?
            RETURNING attempts
            "#,
        )
        .bind(now)
        .bind(&token)
        .bind(post_id)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(row.map(|row| Claim {
            token,
            attempts: u32::try_from(row.get::<i64, _>("attempts")).unwrap_or(0),
        }))
    }

    /// Put a post on the schedule at `at`, compare-and-set on `expected`.
    ///
    /// Resets the attempt counter so a dead-lettered post gets a fresh budget.
    pub async fn schedule_post(&self, post_id: &str, expected: PostStatus, at: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'scheduled', scheduled_at = ?, attempts = 0
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(at)
        .bind(post_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Return claims older than `cutoff` to the status they were claimed from
    pub async fn release_stale_claims(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = COALESCE(claimed_from, 'scheduled'),
                claimed_at = NULL, claimed_from = NULL, claim_token = NULL
            WHERE status = 'publishing' AND claimed_at < ?
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// Persist a rollup, compare-and-set on `claim` still holding the post.
    ///
    /// Returns `false` if the claim was released or taken over by another run.
    pub async fn commit_rollup(
        &self,
        post_id: &str,
        claim: &Claim,
        outcome: &RollupOutcome,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = ?,
                published_platforms = ?,
                published_at = COALESCE(?, published_at),
                attempts = ?,
                claimed_at = NULL,
                claimed_from = NULL,
                claim_token = NULL
            WHERE id = ? AND status = 'publishing' AND claim_token = ?
            "#,
        )
        .bind(outcome.status.as_str())
        .bind(encode_platforms(&outcome.published_platforms)?)
        .bind(outcome.published_at)
        .bind(i64::from(outcome.attempts))
        .bind(post_id)
        .bind(&claim.token)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    // ------------------------------------------------------------------
    // Credentials
    // ------------------------------------------------------------------

    pub async fn upsert_credentials(&self, credentials: &Credentials) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (user_id, twitter_config, linkedin_config, instagram_config,
                                     discord_config, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                twitter_config = excluded.twitter_config,
                linkedin_config = excluded.linkedin_config,
                instagram_config = excluded.instagram_config,
                discord_config = excluded.discord_config,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&credentials.user_id)
        .bind(encode_json(&credentials.twitter)?)
        .bind(encode_json(&credentials.linkedin)?)
        .bind(encode_json(&credentials.instagram)?)
        .bind(encode_json(&credentials.discord)?)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    pub async fn get_credentials(&self, user_id: &str) -> Result<Option<Credentials>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, twitter_config, linkedin_config, instagram_config, discord_config
            FROM credentials WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Credentials {
            user_id: row.get("user_id"),
            twitter: decode_json(row.get("twitter_config"))?,
            linkedin: decode_json(row.get("linkedin_config"))?,
            instagram: decode_json(row.get("instagram_config"))?,
            discord: decode_json(row.get("discord_config"))?,
        }))
    }

    // ------------------------------------------------------------------
    // API tokens
    // ------------------------------------------------------------------

    /// Issue a new opaque token for `user_id`; only its hash is stored
    pub async fn create_api_token(&self, user_id: &str) -> Result<String> {
        let token = format!("fp_{}", uuid::Uuid::new_v4().simple());

        sqlx::query("INSERT INTO api_tokens (token_hash, user_id, created_at) VALUES (?, ?, ?)")
            .bind(hash_token(&token))
            .bind(user_id)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(token)
    }

    /// Resolve the user a bearer token belongs to
    pub async fn user_for_token(&self, token: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT user_id FROM api_tokens WHERE token_hash = ?")
            .bind(hash_token(token))
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.map(|r| r.get("user_id")))
    }
}

fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn encode_platforms(platforms: &[Platform]) -> Result<String> {
    serde_json::to_string(platforms).map_err(|e| {
        DbError::CorruptRow {
            table: "posts",
            reason: e.to_string(),
        }
        .into()
    })
}

fn decode_platforms(raw: &str) -> Result<Vec<Platform>> {
    serde_json::from_str(raw).map_err(|e| {
        DbError::CorruptRow {
            table: "posts",
            reason: format!("bad platform list '{}': {}", raw, e),
        }
        .into()
    })
}

fn encode_json<T: serde::Serialize>(value: &Option<T>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(|v| {
            serde_json::to_string(v).map_err(|e| {
                DbError::CorruptRow {
                    table: "credentials",
                    reason: e.to_string(),
                }
                .into()
            })
        })
        .transpose()
}

fn decode_json<T: serde::de::DeserializeOwned>(raw: Option<String>) -> Result<Option<T>> {
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|e| {
            DbError::CorruptRow {
                table: "credentials",
                reason: e.to_string(),
            }
            .into()
        })
    })
    .transpose()
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let status: String = row.get("status");
    let status = status.parse::<PostStatus>().map_err(|_| DbError::CorruptRow {
        table: "posts",
        reason: format!("unknown status '{}'", status),
    })?;
    let attempts: i64 = row.get("attempts");

    Ok(Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        platforms: decode_platforms(row.get::<&str, _>("platforms"))?,
        media_url: row.get("media_url"),
        scheduled_at: row.get("scheduled_at"),
        status,
        published_platforms: decode_platforms(row.get::<&str, _>("published_platforms"))?,
        published_at: row.get("published_at"),
        attempts: u32::try_from(attempts).unwrap_or(0),
        claimed_at: row.get("claimed_at"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{DiscordConfig, Token};
    use tempfile::TempDir;

    async fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(&db_path.to_string_lossy()).await.unwrap();
        (temp_dir, db)
    }

    #[tokio::test]
    async fn test_post_round_trip() {
        let (_temp, db) = setup_test_db().await;
        let post = Post::new("user-1", "Hello", vec![Platform::Twitter, Platform::Discord])
            .scheduled_for(1_000)
            .with_media("https://cdn.test/a.png");
        db.create_post(&post).await.unwrap();

        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.platforms, vec![Platform::Twitter, Platform::Discord]);
        assert_eq!(stored.status, PostStatus::Scheduled);
        assert_eq!(stored.media_url.as_deref(), Some("https://cdn.test/a.png"));
        assert!(db.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_post_rejects_invalid() {
        let (_temp, db) = setup_test_db().await;
        let post = Post::new("user-1", "", vec![Platform::Twitter]);
        assert!(db.create_post(&post).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_database_shares_one_connection() {
        let db = Database::new(":memory:").await.unwrap();
        let post = Post::new("user-1", "Hello", vec![Platform::Discord]);
        db.create_post(&post).await.unwrap();
        assert!(db.get_post(&post.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_due_posts_window_and_status_filter() {
        let (_temp, db) = setup_test_db().await;
        let now = 10_000;

        let due = Post::new("u", "due", vec![Platform::Twitter]).scheduled_for(now - 60);
        let edge = Post::new("u", "edge", vec![Platform::Twitter]).scheduled_for(now - 300);
        let stale = Post::new("u", "stale", vec![Platform::Twitter]).scheduled_for(now - 301);
        let future = Post::new("u", "future", vec![Platform::Twitter]).scheduled_for(now + 1);
        let draft = Post::new("u", "draft", vec![Platform::Twitter]);
        let mut published = Post::new("u", "done", vec![Platform::Twitter]).scheduled_for(now - 10);
        published.status = PostStatus::Published;
        published.published_platforms = vec![Platform::Twitter];

        for post in [&due, &edge, &stale, &future, &draft, &published] {
            db.create_post(post).await.unwrap();
        }

        let found = db.due_posts(now, 300).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![edge.id.as_str(), due.id.as_str()]);
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let (_temp, db) = setup_test_db().await;
        let post = Post::new("u", "claim me", vec![Platform::Twitter]).scheduled_for(100);
        db.create_post(&post).await.unwrap();

        assert!(db.claim_post(&post.id, PostStatus::Scheduled, 200).await.unwrap().is_some());
        assert!(db.claim_post(&post.id, PostStatus::Scheduled, 201).await.unwrap().is_none());

        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Publishing);
        assert_eq!(stored.claimed_at, Some(200));
    }

    #[tokio::test]
    async fn test_release_stale_claims_restores_prior_status() {
        let (_temp, db) = setup_test_db().await;
        let scheduled = Post::new("u", "s", vec![Platform::Twitter]).scheduled_for(100);
        let draft = Post::new("u", "d", vec![Platform::Twitter]);
        db.create_post(&scheduled).await.unwrap();
        db.create_post(&draft).await.unwrap();

        db.claim_post(&scheduled.id, PostStatus::Scheduled, 100).await.unwrap();
        db.claim_post(&draft.id, PostStatus::Draft, 500).await.unwrap();

        let released = db.release_stale_claims(200).await.unwrap();
        assert_eq!(released, 1);

        let scheduled = db.get_post(&scheduled.id).await.unwrap().unwrap();
        assert_eq!(scheduled.status, PostStatus::Scheduled);
        assert_eq!(scheduled.claimed_at, None);
        let draft = db.get_post(&draft.id).await.unwrap().unwrap();
        assert_eq!(draft.status, PostStatus::Publishing);
    }

    #[tokio::test]
    async fn test_commit_rollup_requires_claim() {
        let (_temp, db) = setup_test_db().await;
        let post = Post::new("u", "x", vec![Platform::Twitter, Platform::Discord]).scheduled_for(100);
        db.create_post(&post).await.unwrap();

        let outcome = RollupOutcome {
            status: PostStatus::PartiallyPublished,
            published_platforms: vec![Platform::Twitter],
            published_at: Some(150),
            attempts: 1,
        };

        let unclaimed = Claim {
            token: "never-issued".to_string(),
            attempts: 0,
        };
        assert!(!db.commit_rollup(&post.id, &unclaimed, &outcome).await.unwrap());

        let claim = db
            .claim_post(&post.id, PostStatus::Scheduled, 120)
            .await
            .unwrap()
            .unwrap();
        assert!(db.commit_rollup(&post.id, &claim, &outcome).await.unwrap());

        let stored = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::PartiallyPublished);
        assert_eq!(stored.published_platforms, vec![Platform::Twitter]);
        assert_eq!(stored.published_at, Some(150));
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.claimed_at, None);
    }

    #[tokio::test]
    async fn test_superseded_claim_cannot_commit() {
        let (_temp, db) = setup_test_db().await;
        let post = Post::new("u", "x", vec![Platform::Discord]).scheduled_for(100);
        db.create_post(&post).await.unwrap();

        let first = db
            .claim_post(&post.id, PostStatus::Scheduled, 100)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(db.release_stale_claims(200).await.unwrap(), 1);
        let second = db
            .claim_post(&post.id, PostStatus::Scheduled, 200)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first.token, second.token);

        let outcome = RollupOutcome {
            status: PostStatus::Published,
            published_platforms: vec![Platform::Discord],
            published_at: Some(210),
            attempts: 1,
        };
        assert!(!db.commit_rollup(&post.id, &first, &outcome).await.unwrap());
        assert_eq!(
            db.get_post(&post.id).await.unwrap().unwrap().status,
            PostStatus::Publishing
        );
        assert!(db.commit_rollup(&post.id, &second, &outcome).await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_reports_current_attempts() {
        let (_temp, db) = setup_test_db().await;
        let post = Post::new("u", "x", vec![Platform::Discord]).scheduled_for(100);
        db.create_post(&post).await.unwrap();
        sqlx::query("UPDATE posts SET attempts = 2 WHERE id = ?")
            .bind(&post.id)
            .execute(db.pool())
            .await
            .unwrap();

        let claim = db
            .claim_post(&post.id, PostStatus::Scheduled, 150)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(claim.attempts, 2);
    }

    #[tokio::test]
    async fn test_credentials_upsert_and_fetch() {
        let (_temp, db) = setup_test_db().await;
        assert!(db.get_credentials("user-1").await.unwrap().is_none());

        let mut credentials = Credentials::new("user-1");
        credentials.discord = Some(DiscordConfig {
            webhook_url: Some("https://discord.test/hook".to_string()),
            ..Default::default()
        });
        db.upsert_credentials(&credentials).await.unwrap();

        let stored = db.get_credentials("user-1").await.unwrap().unwrap();
        assert_eq!(stored, credentials);

        credentials.discord = Some(DiscordConfig {
            bot_token: Some(Token::new("bot")),
            channel_id: Some("42".to_string()),
            ..Default::default()
        });
        db.upsert_credentials(&credentials).await.unwrap();
        let stored = db.get_credentials("user-1").await.unwrap().unwrap();
        assert_eq!(stored.discord.unwrap().channel_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_api_tokens_are_hashed() {
        let (_temp, db) = setup_test_db().await;
        let token = db.create_api_token("user-1").await.unwrap();

        assert_eq!(db.user_for_token(&token).await.unwrap().as_deref(), Some("user-1"));
        assert!(db.user_for_token("fp_wrong").await.unwrap().is_none());

        let raw: Option<(String,)> = sqlx::query_as("SELECT token_hash FROM api_tokens WHERE token_hash = ?")
            .bind(&token)
            .fetch_optional(db.pool())
            .await
            .unwrap();
        assert!(raw.is_none(), "raw token must not be stored");
    }
}
