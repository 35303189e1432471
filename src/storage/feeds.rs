use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedWithOwner};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

/// Never-fetched feeds sort first, then the stalest; creation order breaks ties.
const DUE_ORDER: &str = "last_fetched_at ASC NULLS FIRST, created_at ASC, rowid ASC";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed. The URL is globally unique; a second registration of the
    /// same URL returns `DatabaseError::Duplicate`.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, DatabaseError> {
        let now = Utc::now();
        let feed = sqlx::query_as::<_, Feed>(&format!(
            "INSERT INTO feeds (id, created_at, updated_at, name, url, user_id) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {FEED_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound("feed"))
    }

    pub async fn get_feed_by_id(&self, id: Uuid) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DatabaseError::NotFound("feed"))
    }

    /// All feeds with the name of the user who registered them
    pub async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, DatabaseError> {
        let feeds = sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT f.name, f.url, u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.created_at, f.rowid
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Peek at the feed most due for fetching without stamping it.
    ///
    /// Returns `DatabaseError::NotFound` when the registry is empty.
    pub async fn get_next_feed_to_fetch(&self) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY {DUE_ORDER} LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::NotFound("feed"))
    }

    /// Stamp a feed as fetched at `at`.
    ///
    /// `last_fetched_at` never moves backwards: an older stamp than the stored one
    /// leaves the column untouched.
    pub async fn mark_feed_fetched(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < ?1 THEN ?1
                    ELSE last_fetched_at
                END,
                updated_at = ?1
            WHERE id = ?2
        "#,
        )
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("feed"));
        }
        Ok(())
    }

    /// Select the most-due feed and stamp it in one statement.
    ///
    /// The claim is a single `UPDATE ... RETURNING`, so two callers can never
    /// receive the same feed for the same staleness window.
    pub async fn claim_next_feed(&self, at: DateTime<Utc>) -> Result<Feed, DatabaseError> {
        sqlx::query_as::<_, Feed>(&format!(
            r#"
            UPDATE feeds
            SET last_fetched_at = CASE
                    WHEN last_fetched_at IS NULL OR last_fetched_at < ?1 THEN ?1
                    ELSE last_fetched_at
                END,
                updated_at = ?1
            WHERE id = (SELECT id FROM feeds ORDER BY {DUE_ORDER} LIMIT 1)
            RETURNING {FEED_COLUMNS}
        "#
        ))
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DatabaseError::NotFound("feed"))
    }
}
