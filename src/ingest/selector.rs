use chrono::{DateTime, Utc};

use super::CycleError;
use crate::storage::{Database, Feed};

/// Claim the feed most due for fetching and stamp it as fetched at `now`.
///
/// The stamp is persisted before the caller starts the network request, so a
/// fetch that fails or hangs still moves the feed to the back of the queue.
pub async fn next_due(db: &Database, now: DateTime<Utc>) -> Result<Feed, CycleError> {
    match db.claim_next_feed(now).await {
        Ok(feed) => {
            tracing::debug!(feed = %feed.url, previous = ?feed.last_fetched_at, "Claimed feed");
            Ok(feed)
        }
        Err(e) if e.is_not_found() => Err(CycleError::EmptyRegistry),
        Err(e) => Err(CycleError::Storage(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn test_empty_registry_is_distinct_error() {
        let db = Database::open(":memory:").await.unwrap();
        let err = next_due(&db, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CycleError::EmptyRegistry));
    }

    #[tokio::test]
    async fn test_oldest_first_with_nulls_first() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("tester").await.unwrap();
        let stale = db
            .create_feed("Stale", "https://stale.example.com/rss", user.id)
            .await
            .unwrap();
        let recent = db
            .create_feed("Recent", "https://recent.example.com/rss", user.id)
            .await
            .unwrap();
        let never = db
            .create_feed("Never", "https://never.example.com/rss", user.id)
            .await
            .unwrap();

        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        db.mark_feed_fetched(stale.id, base).await.unwrap();
        db.mark_feed_fetched(recent.id, base + Duration::days(1))
            .await
            .unwrap();

        let now = Utc::now();
        let order = [
            next_due(&db, now).await.unwrap().id,
            next_due(&db, now + Duration::seconds(1)).await.unwrap().id,
            next_due(&db, now + Duration::seconds(2)).await.unwrap().id,
        ];
        assert_eq!(order, [never.id, stale.id, recent.id]);

        // Every feed has now been stamped; the first claim comes round again
        let again = next_due(&db, now + Duration::seconds(3)).await.unwrap();
        assert_eq!(again.id, never.id);
    }

    #[tokio::test]
    async fn test_stamp_is_persisted_before_fetch() {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("tester").await.unwrap();
        let feed = db
            .create_feed("Example", "https://example.com/rss", user.id)
            .await
            .unwrap();

        let now = Utc::now();
        next_due(&db, now).await.unwrap();

        let stored = db.get_feed_by_id(feed.id).await.unwrap();
        assert_eq!(stored.last_fetched_at, Some(now));
        assert_eq!(stored.updated_at, now);
    }
}
