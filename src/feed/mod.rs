//! Feed retrieval for the aggregator.
//!
//! - [`fetcher`] - HTTP GET with a fixed User-Agent and a bounded timeout
//! - [`parser`] - streaming RSS 2.0 reader over `quick-xml` events plus HTML unescaping
//! - [`dates`] - publish-date normalization over an ordered list of layouts

mod dates;
mod fetcher;
mod parser;

pub use dates::normalize;
pub use fetcher::{FetchError, Fetcher, DEFAULT_TIMEOUT, USER_AGENT};
pub use parser::{parse_document, ParseError, RssChannel, RssFeed, RssItem};
