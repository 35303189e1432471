use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use thiserror::Error;

/// Elements nested deeper than this abort the parse
const MAX_DEPTH: usize = 64;

/// An RSS 2.0 document as fetched from the network.
///
/// Only the fields the aggregator stores are kept; everything else in the
/// document, including namespaced extensions such as `atom:link`, is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssFeed {
    pub channel: RssChannel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssChannel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<RssItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publish date exactly as it appeared in the document
    pub pub_date: String,
}

#[derive(Debug, Error)]
pub enum ParseError {
    /// Nothing usable was read: not XML, or no `<channel>` element
    #[error("Not an RSS document: {0}")]
    NotRss(String),

    /// The document broke after its channel was opened. `partial` holds the
    /// channel fields and every item completed before the error.
    #[error("Malformed RSS document: {message}")]
    Truncated { partial: RssFeed, message: String },
}

impl ParseError {
    /// Whatever was read before the error, if the channel was reached
    pub fn into_partial(self) -> Option<RssFeed> {
        match self {
            ParseError::Truncated { partial, .. } => Some(partial),
            ParseError::NotRss(_) => None,
        }
    }
}

/// Parse an RSS document and HTML-unescape its human-readable text.
///
/// Elements are matched by their full name, so `<atom:link>` never collides
/// with `<link>`; when a field repeats, the first non-empty value wins. XML
/// entities are resolved by the reader; the extra HTML pass handles feeds that
/// double-escape their titles (`&amp;amp;`, `&amp;#8217;`).
pub fn parse_document(bytes: &[u8]) -> Result<RssFeed, ParseError> {
    // quick-xml 0.37 never expands <!ENTITY> declarations, so a DOCTYPE cannot
    // inject content here.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut doc = DocumentBuilder::default();
    let mut buf = Vec::new();

    let failure = loop {
        let step = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => doc.open(e.name().as_ref()),
            Ok(Event::Empty(e)) => doc.open(e.name().as_ref()).map(|_| doc.close()),
            Ok(Event::End(_)) => {
                doc.close();
                Ok(())
            }
            Ok(Event::Text(t)) => {
                // Unknown entities (`&nbsp;`) are kept raw for the HTML pass
                let text = t
                    .unescape()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                doc.text(&text);
                Ok(())
            }
            Ok(Event::CData(c)) => {
                doc.text(&String::from_utf8_lossy(&c));
                Ok(())
            }
            Ok(Event::Eof) => break doc.unclosed(),
            Ok(_) => Ok(()),
            Err(e) => Err(format!("{e} at byte {}", reader.buffer_position())),
        };
        if let Err(message) = step {
            break Some(message);
        }
        buf.clear();
    };

    doc.finish(failure)
}

impl RssFeed {
    /// Unescape channel and item titles/descriptions in place.
    pub fn unescape_text(&mut self) {
        let channel = &mut self.channel;
        unescape_in_place(&mut channel.title);
        unescape_in_place(&mut channel.description);
        for item in channel.items.iter_mut() {
            unescape_in_place(&mut item.title);
            unescape_in_place(&mut item.description);
        }
    }
}

impl RssChannel {
    fn set(&mut self, field: &[u8], value: String) {
        match field {
            b"title" => fill(&mut self.title, value),
            b"link" => fill(&mut self.link, value),
            b"description" => fill(&mut self.description, value),
            _ => {}
        }
    }
}

impl RssItem {
    fn set(&mut self, field: &[u8], value: String) {
        match field {
            b"title" => fill(&mut self.title, value),
            b"link" => fill(&mut self.link, value),
            b"description" => fill(&mut self.description, value),
            b"pubDate" => fill(&mut self.pub_date, value),
            _ => {}
        }
    }
}

fn fill(slot: &mut String, value: String) {
    if slot.is_empty() {
        *slot = value;
    }
}

fn unescape_in_place(text: &mut String) {
    if !text.contains('&') {
        return;
    }
    let decoded = html_escape::decode_html_entities(text.as_str()).into_owned();
    *text = decoded;
}

/// Streaming state for [`parse_document`].
///
/// `path` is the stack of open element names. `marks` records where each open
/// element's text starts in `text`; closing an element takes its own text and
/// discards it from the buffer, so a parent never sees a child's text.
#[derive(Default)]
struct DocumentBuilder {
    feed: RssFeed,
    item: Option<RssItem>,
    seen_channel: bool,
    path: Vec<Vec<u8>>,
    marks: Vec<usize>,
    text: String,
}

impl DocumentBuilder {
    fn open(&mut self, name: &[u8]) -> Result<(), String> {
        if self.path.len() >= MAX_DEPTH {
            return Err(format!("elements nested deeper than {MAX_DEPTH}"));
        }
        self.path.push(name.to_vec());
        self.marks.push(self.text.len());

        let path: Vec<&[u8]> = self.path.iter().map(Vec::as_slice).collect();
        match path.as_slice() {
            [_, b"channel"] => self.seen_channel = true,
            [_, b"channel", b"item"] => self.item = Some(RssItem::default()),
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn close(&mut self) {
        let mark = self.marks.pop().unwrap_or(0);
        let value = self.text[mark..].to_string();
        self.text.truncate(mark);

        let path: Vec<&[u8]> = self.path.iter().map(Vec::as_slice).collect();
        match path.as_slice() {
            [_, b"channel", b"item"] => {
                if let Some(item) = self.item.take() {
                    self.feed.channel.items.push(item);
                }
            }
            [_, b"channel", b"item", field] => {
                if let Some(item) = self.item.as_mut() {
                    item.set(field, value);
                }
            }
            [_, b"channel", field] => self.feed.channel.set(field, value),
            _ => {}
        }
        self.path.pop();
    }

    /// Error for a document that ended with elements still open
    fn unclosed(&self) -> Option<String> {
        self.path
            .last()
            .map(|name| format!("document ended inside <{}>", String::from_utf8_lossy(name)))
    }

    fn finish(self, failure: Option<String>) -> Result<RssFeed, ParseError> {
        let mut feed = self.feed;
        match failure {
            None if self.seen_channel => {
                feed.unescape_text();
                Ok(feed)
            }
            None => Err(ParseError::NotRss("no <channel> element".to_string())),
            Some(message) if self.seen_channel => {
                feed.unescape_text();
                Err(ParseError::Truncated {
                    partial: feed,
                    message,
                })
            }
            Some(message) => Err(ParseError::NotRss(message)),
        }
    }
}
