//! Small helpers shared by the commands and the aggregator.
//!
//! - **Intervals**: `1m`, `30s`, `1h30m` style duration strings
//! - **URL validation**: feed URLs must be http(s) with a host
//! - **Text**: terminal-safe rendering of feed-supplied strings

mod duration;
mod text;
mod url_validator;

pub use duration::{parse_interval, DurationError};
pub use text::strip_control_chars;
pub use url_validator::{validate_feed_url, UrlValidationError};
