use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::persister::{persist, PersistOutcome};
use super::selector::next_due;
use super::CycleError;
use crate::feed::{FetchError, Fetcher};
use crate::storage::Database;

/// Counts for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub feed_name: String,
    pub feed_url: String,
    pub channel_title: String,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the document broke partway; the counts cover the items read before the break
    pub parse_error: Option<String>,
}

/// Outcome of a cycle as delivered to an observer of [`Aggregator::run`]
pub type CycleReport = Result<CycleSummary, CycleError>;

/// Fixed-interval ingestion loop.
///
/// Each tick claims exactly one feed, fetches it and stores its items. The
/// first tick fires immediately; later ticks follow `interval`. A cycle that
/// overruns the interval delays the next tick instead of causing a burst.
#[derive(Clone)]
pub struct Aggregator {
    db: Database,
    fetcher: Fetcher,
    interval: Duration,
}

impl Aggregator {
    pub fn new(db: Database, fetcher: Fetcher, interval: Duration) -> Self {
        Self {
            db,
            fetcher,
            interval,
        }
    }

    /// Run ticks until `shutdown` resolves.
    ///
    /// Failed cycles are logged and the loop keeps polling. When `reports` is
    /// given, every finished cycle is sent on it; a dropped receiver is ignored.
    pub async fn run<F>(&self, shutdown: F, reports: Option<mpsc::Sender<CycleReport>>)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            // An in-flight cycle is dropped on shutdown; the feed stays stamped.
            let report = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                report = self.run_cycle() => report,
            };

            log_report(&report);

            if let Some(tx) = &reports {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    sent = tx.send(report) => {
                        if sent.is_err() {
                            tracing::debug!("Cycle report receiver dropped");
                        }
                    }
                }
            }
        }

        tracing::info!("Aggregator stopped");
    }

    /// One selector → fetch → persist pass over a single feed.
    pub async fn run_cycle(&self) -> Result<CycleSummary, CycleError> {
        let feed = next_due(&self.db, Utc::now()).await?;

        let (document, parse_error) = match self.fetcher.fetch(&feed.url).await {
            Ok(document) => (document, None),
            Err(FetchError::Truncated { partial, message }) => {
                tracing::warn!(
                    feed = %feed.name,
                    items = partial.channel.items.len(),
                    error = %message,
                    "Feed document is malformed, storing the items read before the error"
                );
                (*partial, Some(message))
            }
            Err(source) => {
                return Err(CycleError::Fetch {
                    url: feed.url,
                    source,
                })
            }
        };

        let channel = document.channel;
        let mut summary = CycleSummary {
            feed_name: feed.name,
            feed_url: feed.url,
            channel_title: channel.title,
            parse_error,
            ..CycleSummary::default()
        };

        if channel.items.is_empty() {
            tracing::info!(feed = %summary.feed_name, "Feed has no items");
            return Ok(summary);
        }

        for item in &channel.items {
            match persist(&self.db, feed.id, item, Utc::now()).await {
                Ok(PersistOutcome::Inserted) => summary.inserted += 1,
                Ok(PersistOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        feed = %summary.feed_name,
                        url = %item.link,
                        error = %e,
                        "Failed to store post"
                    );
                }
            }
        }

        Ok(summary)
    }
}

fn log_report(report: &CycleReport) {
    match report {
        Ok(CycleSummary {
            feed_name,
            parse_error: Some(error),
            inserted,
            ..
        }) => tracing::warn!(
            feed = %feed_name,
            inserted,
            error = %error,
            "Cycle completed on a partial document"
        ),
        Ok(summary) => tracing::info!(
            feed = %summary.feed_name,
            channel = %summary.channel_title,
            inserted = summary.inserted,
            skipped = summary.skipped,
            failed = summary.failed,
            "Cycle complete"
        ),
        Err(CycleError::EmptyRegistry) => {
            tracing::warn!("No feeds registered, nothing to fetch this tick")
        }
        Err(e) => tracing::warn!(error = %e, "Cycle aborted, will retry on next tick"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::DEFAULT_TIMEOUT;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TWO_ITEMS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example</title>
    <link>https://example.com</link>
    <description>An example feed</description>
    <item>
        <title>&amp;amp;Go</title>
        <link>https://example.com/go</link>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
    <item>
        <title>Rust &amp;amp; Tokio</title>
        <link>https://example.com/rust</link>
        <pubDate>not-a-date</pubDate>
    </item>
</channel></rss>"#;

    const TRUNCATED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Flaky</title>
    <item><title>One</title><link>https://example.com/one</link></item>
    <item><title>Two</title><link>https://example.com/two</link></item>
    <item><title>Thr"#;

    const NO_LINKS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Linkless</title>
    <item><title>First</title></item>
    <item><title>Second</title><link>  </link></item>
    <item><title>Third</title><link>https://example.com/third</link></item>
</channel></rss>"#;

    const NO_ITEMS: &str =
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Quiet</title></channel></rss>"#;

    async fn aggregator_with_feeds(urls: &[String], interval: Duration) -> (Aggregator, Database) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("tester").await.unwrap();
        for (i, url) in urls.iter().enumerate() {
            db.create_feed(&format!("Feed {i}"), url, user.id)
                .await
                .unwrap();
        }
        let fetcher = Fetcher::new(DEFAULT_TIMEOUT).unwrap();
        (Aggregator::new(db.clone(), fetcher, interval), db)
    }

    async fn serve(server: &MockServer, route: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_cycle_stores_unescaped_items() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, TWO_ITEMS).await;

        let (agg, db) =
            aggregator_with_feeds(&[format!("{}/feed", server.uri())], Duration::from_secs(60))
                .await;

        let summary = agg.run_cycle().await.unwrap();
        assert_eq!(summary.channel_title, "Example");
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 0);

        let feed = db
            .get_feed_by_url(&format!("{}/feed", server.uri()))
            .await
            .unwrap();
        let mut titles: Vec<String> = db
            .get_posts_for_feed(feed.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        titles.sort();
        assert_eq!(titles, vec!["&Go".to_string(), "Rust & Tokio".to_string()]);
    }

    #[tokio::test]
    async fn test_second_cycle_skips_duplicates() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, TWO_ITEMS).await;

        let (agg, _db) =
            aggregator_with_feeds(&[format!("{}/feed", server.uri())], Duration::from_secs(60))
                .await;

        agg.run_cycle().await.unwrap();
        let again = agg.run_cycle().await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.skipped, 2);
    }

    #[tokio::test]
    async fn test_zero_items_is_success() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, NO_ITEMS).await;

        let (agg, _db) =
            aggregator_with_feeds(&[format!("{}/feed", server.uri())], Duration::from_secs(60))
                .await;

        let summary = agg.run_cycle().await.unwrap();
        assert_eq!(summary.channel_title, "Quiet");
        assert_eq!(summary.inserted + summary.skipped + summary.failed, 0);
    }

    #[tokio::test]
    async fn test_truncated_document_stores_completed_items() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, TRUNCATED).await;

        let (agg, db) =
            aggregator_with_feeds(&[format!("{}/feed", server.uri())], Duration::from_secs(60))
                .await;

        let summary = agg.run_cycle().await.unwrap();
        assert_eq!(summary.channel_title, "Flaky");
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.parse_error.is_some());

        let feed = db
            .get_feed_by_url(&format!("{}/feed", server.uri()))
            .await
            .unwrap();
        assert_eq!(db.get_posts_for_feed(feed.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_items_without_links_count_as_failed() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 200, NO_LINKS).await;

        let (agg, _db) =
            aggregator_with_feeds(&[format!("{}/feed", server.uri())], Duration::from_secs(60))
                .await;

        let summary = agg.run_cycle().await.unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 2);
        assert!(summary.parse_error.is_none());
    }

    #[tokio::test]
    async fn test_http_status_aborts_cycle() {
        let server = MockServer::start().await;
        serve(&server, "/feed", 404, "").await;

        let (agg, db) =
            aggregator_with_feeds(&[format!("{}/feed", server.uri())], Duration::from_secs(60))
                .await;

        let err = agg.run_cycle().await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("404"));

        // The feed was stamped even though the fetch failed
        let feed = db
            .get_feed_by_url(&format!("{}/feed", server.uri()))
            .await
            .unwrap();
        assert!(feed.last_fetched_at.is_some());
    }

    #[tokio::test]
    async fn test_empty_registry_aborts_cycle() {
        let (agg, _db) = aggregator_with_feeds(&[], Duration::from_secs(60)).await;
        let err = agg.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::EmptyRegistry));
        assert_eq!(err.status(), None);
    }

    #[tokio::test]
    async fn test_loop_continues_after_failed_cycle() {
        let server = MockServer::start().await;
        serve(&server, "/broken", 500, "").await;
        serve(&server, "/ok", 200, TWO_ITEMS).await;

        let interval = Duration::from_millis(20);
        let (agg, _db) = aggregator_with_feeds(
            &[
                format!("{}/broken", server.uri()),
                format!("{}/ok", server.uri()),
            ],
            interval,
        )
        .await;

        let (report_tx, mut report_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let started = std::time::Instant::now();
        let handle = tokio::spawn(async move {
            agg.run(
                async {
                    let _ = stop_rx.await;
                },
                Some(report_tx),
            )
            .await;
        });

        let first = report_rx.recv().await.unwrap();
        assert_eq!(first.unwrap_err().status(), Some(500));

        let second = report_rx.recv().await.unwrap().unwrap();
        assert!(started.elapsed() >= interval);
        assert_eq!(second.inserted, 2);

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_loop_keeps_polling_empty_registry() {
        let (agg, _db) = aggregator_with_feeds(&[], Duration::from_millis(10)).await;

        let (report_tx, mut report_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            agg.run(
                async {
                    let _ = stop_rx.await;
                },
                Some(report_tx),
            )
            .await;
        });

        for _ in 0..3 {
            let report = report_rx.recv().await.unwrap();
            assert!(matches!(report, Err(CycleError::EmptyRegistry)));
        }

        stop_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_while_report_channel_is_full() {
        let (agg, _db) = aggregator_with_feeds(&[], Duration::from_millis(10)).await;

        // Capacity one and never read: the second report blocks on send
        let (report_tx, report_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            agg.run(
                async {
                    let _ = stop_rx.await;
                },
                Some(report_tx),
            )
            .await;
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        stop_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("aggregator did not stop while blocked on a full report channel")
            .unwrap();
        drop(report_rx);
    }
}
