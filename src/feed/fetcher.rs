use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use super::parser::{parse_document, ParseError, RssFeed};

/// Sent as `User-Agent` on every feed request
pub const USER_AGENT: &str = "gator";

/// Per-request timeout used by the aggregator
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving a feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as an RSS document
    #[error("Parse error: {0}")]
    Parse(String),
    /// Body broke partway through; `partial` holds what was read before the break
    #[error("Malformed feed document: {message}")]
    Truncated {
        partial: Box<RssFeed>,
        message: String,
    },
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

impl From<ParseError> for FetchError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::NotRss(message) => FetchError::Parse(message),
            ParseError::Truncated { partial, message } => FetchError::Truncated {
                partial: Box::new(partial),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Network(err)
        }
    }
}

impl FetchError {
    /// HTTP status carried by the error, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus(code) => Some(*code),
            _ => None,
        }
    }
}

/// HTTP client for feed documents.
///
/// Cloning is cheap; the underlying `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Network)?;
        Ok(Self { client })
    }

    /// GET `url` and parse the body as an RSS document.
    ///
    /// # Errors
    ///
    /// - [`FetchError::HttpStatus`] - status outside 200..300
    /// - [`FetchError::Timeout`] - the request exceeded the fetcher's timeout
    /// - [`FetchError::Network`] - connection or TLS failure
    /// - [`FetchError::ResponseTooLarge`] - body over 10MB
    /// - [`FetchError::Parse`] - body is not an RSS document
    /// - [`FetchError::Truncated`] - body broke after the channel began; carries the partial feed
    pub async fn fetch(&self, url: &str) -> Result<RssFeed, FetchError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(feed = %url, status = status.as_u16(), "Feed request rejected");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;
        let feed = parse_document(&bytes)?;

        tracing::debug!(
            feed = %url,
            bytes = bytes.len(),
            items = feed.channel.items.len(),
            "Fetched feed document"
        );
        Ok(feed)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header. A body shorter than the header
    // surfaces as a stream error from reqwest.
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example</title>
    <item><title>First</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    fn fetcher() -> Fetcher {
        Fetcher::new(DEFAULT_TIMEOUT).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success_sends_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/rss+xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let feed = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(feed.channel.title, "Example");
        assert_eq!(feed.channel.items.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let err = Fetcher::new(Duration::from_millis(50))
            .unwrap()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_malformed_feed_parse_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<not valid xml"))
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::Parse(_) => {}
            e => panic!("Expected Parse error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_truncated_feed_carries_partial_items() {
        let mock_server = MockServer::start().await;
        let body = r#"<rss><channel><title>Example</title>
            <item><title>First</title><link>https://example.com/1</link></item>
            <item><title>Sec"#;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::Truncated { partial, .. } => {
                assert_eq!(partial.channel.items.len(), 1);
                assert_eq!(partial.channel.items[0].title, "First");
            }
            e => panic!("Expected Truncated error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID_RSS))
            .mount(&mock_server)
            .await;

        let response = reqwest::get(format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        let err = read_limited_bytes(response, 16).await.unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge));

        let response = reqwest::get(format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await.unwrap();
        assert_eq!(bytes, VALID_RSS.as_bytes());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b' '; MAX_FEED_SIZE + 1]))
            .mount(&mock_server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/feed", mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge));
    }
}
