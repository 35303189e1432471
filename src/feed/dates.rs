//! Publish-date normalization.
//!
//! Feeds in the wild disagree about date formats. [`normalize`] walks a fixed,
//! ordered table of layouts and keeps the first one that parses; anything else
//! resolves to the caller's fallback.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// How a layout expresses its time zone.
#[derive(Debug, Clone, Copy)]
enum Zone {
    /// Numeric offset such as `-0700`
    Numeric,
    /// Alphabetic abbreviation such as `MST`, rewritten to a numeric offset first
    Abbrev,
    /// No zone at all; the value is taken as UTC
    Naive,
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    Pattern {
        name: &'static str,
        format: &'static str,
        zone: Zone,
    },
    Rfc3339 {
        name: &'static str,
        fractional: bool,
    },
}

/// Tried in order; the first successful parse wins.
const LAYOUTS: &[Layout] = &[
    Layout::Pattern {
        name: "reference",
        format: "%m/%d %I:%M:%S%p '%y %z",
        zone: Zone::Numeric,
    },
    Layout::Pattern {
        name: "ansic",
        format: "%a %b %e %H:%M:%S %Y",
        zone: Zone::Naive,
    },
    Layout::Pattern {
        name: "unix",
        format: "%a %b %e %H:%M:%S %z %Y",
        zone: Zone::Abbrev,
    },
    Layout::Pattern {
        name: "ruby",
        format: "%a %b %d %H:%M:%S %z %Y",
        zone: Zone::Numeric,
    },
    Layout::Pattern {
        name: "rfc822",
        format: "%d %b %y %H:%M %z",
        zone: Zone::Abbrev,
    },
    Layout::Pattern {
        name: "rfc822z",
        format: "%d %b %y %H:%M %z",
        zone: Zone::Numeric,
    },
    Layout::Pattern {
        name: "rfc850",
        format: "%A, %d-%b-%y %H:%M:%S %z",
        zone: Zone::Abbrev,
    },
    Layout::Pattern {
        name: "rfc1123",
        format: "%a, %d %b %Y %H:%M:%S %z",
        zone: Zone::Abbrev,
    },
    Layout::Pattern {
        name: "rfc1123z",
        format: "%a, %d %b %Y %H:%M:%S %z",
        zone: Zone::Numeric,
    },
    Layout::Rfc3339 {
        name: "rfc3339",
        fractional: false,
    },
    Layout::Rfc3339 {
        name: "rfc3339nano",
        fractional: true,
    },
];

/// Zone abbreviations with a well-known offset (RFC 822 section 5).
/// Any other abbreviation is read as a zero offset.
const KNOWN_ZONES: &[(&str, i32)] = &[
    ("UT", 0),
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
];

/// Resolve a raw publish date, returning `fallback` when no layout matches.
pub fn normalize(raw: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let raw = raw.trim();
    if raw.is_empty() {
        return fallback;
    }

    let with_numeric_zone = replace_zone_abbreviation(raw);

    for layout in LAYOUTS {
        if let Some(parsed) = layout.parse(raw, with_numeric_zone.as_deref()) {
            tracing::trace!(layout = layout.name(), raw = %raw, "Parsed publish date");
            return parsed;
        }
    }

    tracing::debug!(raw = %raw, "Unrecognized publish date, using fallback");
    fallback
}

impl Layout {
    fn name(&self) -> &'static str {
        match self {
            Layout::Pattern { name, .. } | Layout::Rfc3339 { name, .. } => name,
        }
    }

    fn parse(&self, raw: &str, with_numeric_zone: Option<&str>) -> Option<DateTime<Utc>> {
        match *self {
            Layout::Pattern {
                format,
                zone: Zone::Numeric,
                ..
            } => DateTime::parse_from_str(raw, format)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Pattern {
                format,
                zone: Zone::Abbrev,
                ..
            } => with_numeric_zone
                .and_then(|s| DateTime::parse_from_str(s, format).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Pattern {
                format,
                zone: Zone::Naive,
                ..
            } => NaiveDateTime::parse_from_str(raw, format)
                .ok()
                .map(|naive| naive.and_utc()),
            Layout::Rfc3339 { fractional, .. } => {
                if has_fraction(raw) != fractional {
                    return None;
                }
                DateTime::parse_from_rfc3339(raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            }
        }
    }
}

/// `2006-01-02T15:04:05.999Z` has a fraction, `2006-01-02T15:04:05Z` does not.
fn has_fraction(raw: &str) -> bool {
    raw.split_once('T')
        .map(|(_, time)| time.contains('.'))
        .unwrap_or(false)
}

/// Rewrite the first zone-abbreviation token (`MST`, `GMT`, ...) into a numeric
/// offset so the `%z` layouts can read it. Returns `None` when there is none.
fn replace_zone_abbreviation(raw: &str) -> Option<String> {
    let token = raw.split_whitespace().find(|t| is_zone_abbreviation(t))?;
    let hours = KNOWN_ZONES
        .iter()
        .find(|(abbr, _)| *abbr == token)
        .map(|(_, hours)| *hours)
        .unwrap_or(0);
    let offset = FixedOffset::east_opt(hours * 3600)?;
    let numeric = offset.to_string().replace(':', "");
    Some(raw.replacen(token, &numeric, 1))
}

fn is_zone_abbreviation(token: &str) -> bool {
    (2..=5).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_uppercase())
}
