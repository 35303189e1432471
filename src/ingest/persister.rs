use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::feed::{normalize, RssItem};
use crate::storage::{Database, DatabaseError, NewPost};

/// What happened to one item of a fetched document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    /// A post with the same URL is already stored
    Skipped,
}

/// Why one item could not be stored.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The item has no `<link>`; the URL is the post's identity
    #[error("Item '{0}' has no link")]
    MissingLink(String),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

/// Store one RSS item as a post of `feed_id`.
///
/// A duplicate URL is an expected outcome and reported as
/// [`PersistOutcome::Skipped`]. An item without a link is rejected before
/// touching the store; every other storage error is returned.
pub async fn persist(
    db: &Database,
    feed_id: Uuid,
    item: &RssItem,
    now: DateTime<Utc>,
) -> Result<PersistOutcome, PersistError> {
    let url = item.link.trim();
    if url.is_empty() {
        return Err(PersistError::MissingLink(item.title.clone()));
    }

    let post = NewPost {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        title: item.title.clone(),
        url: url.to_string(),
        description: Some(item.description.clone()).filter(|d| !d.trim().is_empty()),
        published_at: normalize(&item.pub_date, now),
        feed_id,
    };

    match db.create_post(&post).await {
        Ok(_) => Ok(PersistOutcome::Inserted),
        Err(e) if e.is_duplicate() => {
            tracing::debug!(url = %post.url, "Post already stored, skipping");
            Ok(PersistOutcome::Skipped)
        }
        Err(e) => Err(PersistError::Storage(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Feed;
    use chrono::TimeZone;

    async fn setup() -> (Database, Feed) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("tester").await.unwrap();
        let feed = db
            .create_feed("Example", "https://example.com/rss", user.id)
            .await
            .unwrap();
        (db, feed)
    }

    fn item(link: &str, pub_date: &str) -> RssItem {
        RssItem {
            title: "Hello".to_string(),
            link: link.to_string(),
            description: String::new(),
            pub_date: pub_date.to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_url_twice_is_skipped() {
        let (db, feed) = setup().await;
        let now = Utc::now();
        let entry = item("https://example.com/a", "");

        assert_eq!(
            persist(&db, feed.id, &entry, now).await.unwrap(),
            PersistOutcome::Inserted
        );
        assert_eq!(
            persist(&db, feed.id, &entry, now).await.unwrap(),
            PersistOutcome::Skipped
        );
        assert_eq!(db.get_posts_for_feed(feed.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_date_falls_back_to_now() {
        let (db, feed) = setup().await;
        let now = Utc.with_ymd_and_hms(2024, 5, 5, 5, 5, 5).unwrap();

        persist(&db, feed.id, &item("https://example.com/a", "not-a-date"), now)
            .await
            .unwrap();

        let posts = db.get_posts_for_feed(feed.id).await.unwrap();
        assert_eq!(posts[0].published_at, now);
        assert_eq!(posts[0].created_at, now);
        assert!(posts[0].description.is_none());
    }

    #[tokio::test]
    async fn test_parsed_date_and_description_stored() {
        let (db, feed) = setup().await;
        let mut entry = item("https://example.com/a", "Mon, 02 Jan 2006 15:04:05 -0700");
        entry.description = "Summary".to_string();

        persist(&db, feed.id, &entry, Utc::now()).await.unwrap();

        let posts = db.get_posts_for_feed(feed.id).await.unwrap();
        assert_eq!(
            posts[0].published_at,
            Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap()
        );
        assert_eq!(posts[0].description.as_deref(), Some("Summary"));
    }

    #[tokio::test]
    async fn test_unknown_feed_is_real_error() {
        let (db, _) = setup().await;
        let err = persist(&db, Uuid::new_v4(), &item("https://example.com/a", ""), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::Storage(ref e) if !e.is_duplicate()));
    }

    #[tokio::test]
    async fn test_missing_link_is_rejected() {
        let (db, feed) = setup().await;
        let now = Utc::now();

        for link in ["", "   "] {
            let err = persist(&db, feed.id, &item(link, ""), now)
                .await
                .unwrap_err();
            assert!(matches!(err, PersistError::MissingLink(ref title) if title == "Hello"));
        }
        assert!(db.get_posts_for_feed(feed.id).await.unwrap().is_empty());
    }
}
