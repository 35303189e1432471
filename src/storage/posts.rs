use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post, PostWithFeed};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a post.
    ///
    /// The URL is unique across all posts; inserting a URL that is already
    /// stored fails with `DatabaseError::Duplicate` and leaves the existing row
    /// untouched.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        let stored = sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, created_at, updated_at, title, url, description, published_at, feed_id
        "#,
        )
        .bind(post.id)
        .bind(post.created_at)
        .bind(post.updated_at)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(post.feed_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    /// Newest posts from the feeds `user_id` follows, at most `limit` rows.
    pub async fn get_posts_by_user(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<PostWithFeed>, DatabaseError> {
        let posts = sqlx::query_as::<_, PostWithFeed>(
            r#"
            SELECT p.title, p.url, p.description, p.published_at, f.name AS feed_name
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Every stored post for one feed, newest first
    pub async fn get_posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, DatabaseError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT id, created_at, updated_at, title, url, description, published_at, feed_id
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }
}
