//! RSS 2.0 and Atom parsing
//!
//! Consumes arbitrary third-party feed XML. The flavor is detected by the
//! presence of a `channel` element (RSS 2.0) versus `entry` elements
//! (Atom); anything else is rejected as unsupported. A malformed payload
//! aborts the whole parse with no partial recovery; the fetch is
//! recorded as a format failure and retried on the next attempt.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::utils::error::FeedParseError;
use crate::utils::text::parse_feed_date;

/// Detected feed flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Rss2,
    Atom,
}

impl FeedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rss2 => "rss",
            Self::Atom => "atom",
        }
    }
}

/// One extracted feed item
#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A parsed feed: channel metadata plus items in source order
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub kind: FeedKind,
    pub title: String,
    pub description: String,
    pub link: String,
    pub items: Vec<FeedItem>,
}

/// Parse a feed payload
pub fn parse_feed(xml: &str) -> Result<ParsedFeed, FeedParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut kind: Option<FeedKind> = None;
    let mut title = String::new();
    let mut description = String::new();
    let mut link = String::new();
    let mut items: Vec<FeedItem> = Vec::new();
    let mut current: Option<FeedItem> = None;

    // Element name stack; the tail decides where character data lands
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Err(e) => return Err(FeedParseError::InvalidXml(e.to_string())),
            Ok(Event::Eof) => break,

            Ok(Event::Start(start)) => {
                let name = local_name(start.name().as_ref());

                match name.as_str() {
                    "channel" => kind = kind.or(Some(FeedKind::Rss2)),
                    "item" | "entry" => {
                        if name == "entry" {
                            kind = kind.or(Some(FeedKind::Atom));
                        }
                        current = Some(FeedItem::default());
                    }
                    "link" => {
                        // Atom carries the target in an href attribute
                        if let Some(href) = attr_value(&start, b"href") {
                            assign_link(&mut current, &mut link, href);
                        }
                    }
                    _ => {}
                }

                path.push(name);
            }

            Ok(Event::Empty(empty)) => {
                let name = local_name(empty.name().as_ref());
                if name == "link" {
                    if let Some(href) = attr_value(&empty, b"href") {
                        assign_link(&mut current, &mut link, href);
                    }
                }
            }

            Ok(Event::Text(text)) => {
                let value = text
                    .unescape()
                    .map_err(|e| FeedParseError::InvalidXml(e.to_string()))?
                    .into_owned();
                dispatch_text(
                    &path,
                    &value,
                    &mut current,
                    &mut title,
                    &mut description,
                    &mut link,
                );
            }

            Ok(Event::CData(cdata)) => {
                let value = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                dispatch_text(
                    &path,
                    &value,
                    &mut current,
                    &mut title,
                    &mut description,
                    &mut link,
                );
            }

            Ok(Event::End(end)) => {
                let name = local_name(end.name().as_ref());
                if matches!(name.as_str(), "item" | "entry") {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                path.pop();
            }

            Ok(_) => {}
        }
    }

    match kind {
        Some(kind) => Ok(ParsedFeed {
            kind,
            title,
            description,
            link,
            items,
        }),
        None => Err(FeedParseError::UnsupportedFormat),
    }
}

/// Route character data to the current item or the channel metadata
fn dispatch_text(
    path: &[String],
    value: &str,
    current: &mut Option<FeedItem>,
    title: &mut String,
    description: &mut String,
    link: &mut String,
) {
    let Some(element) = path.last() else {
        return;
    };

    if let Some(item) = current.as_mut() {
        match element.as_str() {
            "title" => push_text(&mut item.title, value),
            "description" | "summary" => push_text(&mut item.description, value),
            // Atom full content stands in when no summary was given
            "content" if item.description.is_empty() => push_text(&mut item.description, value),
            "link" => push_text(&mut item.link, value),
            "pubdate" | "published" => {
                if item.published_at.is_none() {
                    item.published_at = parse_feed_date(value);
                }
            }
            "updated" if item.published_at.is_none() => {
                item.published_at = parse_feed_date(value);
            }
            _ => {}
        }
        return;
    }

    // Channel-level metadata: only direct children of channel/feed, so an
    // RSS <image><title> cannot overwrite the channel title
    let parent = path.len().checked_sub(2).map(|i| path[i].as_str());
    if !matches!(parent, Some("channel") | Some("feed")) {
        return;
    }

    match element.as_str() {
        "title" => push_text(title, value),
        "description" | "subtitle" => push_text(description, value),
        "link" => push_text(link, value),
        _ => {}
    }
}

fn push_text(target: &mut String, value: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(value);
}

fn assign_link(current: &mut Option<FeedItem>, channel_link: &mut String, href: String) {
    match current.as_mut() {
        Some(item) if item.link.is_empty() => item.link = href,
        Some(_) => {}
        None if channel_link.is_empty() => *channel_link = href,
        None => {}
    }
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw).to_ascii_lowercase();
    match name.rsplit(':').next() {
        Some(local) => local.to_string(),
        None => name,
    }
}

fn attr_value(element: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>World Wire</title>
    <description>International coverage</description>
    <link>https://example.com</link>
    <item>
      <title>First story</title>
      <description><![CDATA[<p>Something <b>happened</b>.</p>]]></description>
      <link>https://example.com/first</link>
      <pubDate>Tue, 06 Aug 2024 10:30:00 +0000</pubDate>
    </item>
    <item>
      <title>Second story</title>
      <description>Plain text body</description>
      <link>https://example.com/second</link>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Wire</title>
  <subtitle>An atom feed</subtitle>
  <link href="https://example.org/"/>
  <entry>
    <title>Entry one</title>
    <summary>Short summary</summary>
    <link href="https://example.org/one"/>
    <published>2024-08-06T10:30:00Z</published>
  </entry>
  <entry>
    <title>Entry two</title>
    <content type="html">Full content body</content>
    <link href="https://example.org/two"/>
    <updated>2024-08-05T08:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss2() {
        let feed = parse_feed(RSS_SAMPLE).unwrap();
        assert_eq!(feed.kind, FeedKind::Rss2);
        assert_eq!(feed.title, "World Wire");
        assert_eq!(feed.description, "International coverage");
        assert_eq!(feed.link, "https://example.com");
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title, "First story");
        assert!(first.description.contains("<b>happened</b>"));
        assert_eq!(first.link, "https://example.com/first");
        assert!(first.published_at.is_some());

        // Missing pubDate stays None; the importer supplies a default
        assert!(feed.items[1].published_at.is_none());
    }

    #[test]
    fn test_parse_atom() {
        let feed = parse_feed(ATOM_SAMPLE).unwrap();
        assert_eq!(feed.kind, FeedKind::Atom);
        assert_eq!(feed.title, "Atom Wire");
        assert_eq!(feed.description, "An atom feed");
        assert_eq!(feed.link, "https://example.org/");
        assert_eq!(feed.items.len(), 2);

        assert_eq!(feed.items[0].link, "https://example.org/one");
        assert_eq!(feed.items[0].description, "Short summary");
        assert_eq!(feed.items[1].description, "Full content body");
        assert!(feed.items[1].published_at.is_some());
    }

    #[test]
    fn test_items_in_source_order() {
        let feed = parse_feed(RSS_SAMPLE).unwrap();
        assert_eq!(feed.items[0].title, "First story");
        assert_eq!(feed.items[1].title, "Second story");
    }

    #[test]
    fn test_malformed_xml_rejected() {
        let result = parse_feed("<rss><channel><item></rss>");
        assert!(matches!(result, Err(FeedParseError::InvalidXml(_))));
    }

    #[test]
    fn test_non_feed_xml_unsupported() {
        let result = parse_feed("<?xml version=\"1.0\"?><html><body>nope</body></html>");
        assert!(matches!(result, Err(FeedParseError::UnsupportedFormat)));
    }

    #[test]
    fn test_rss_image_title_does_not_leak() {
        let xml = r#"<rss version="2.0"><channel>
            <title>Real Title</title>
            <image><title>Logo Title</title><url>https://example.com/logo.png</url></image>
        </channel></rss>"#;

        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.title, "Real Title");
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = r#"<rss version="2.0"><channel><title>A &amp; B</title>
            <item><title>Q&amp;A</title><link>https://example.com/qa</link></item>
        </channel></rss>"#;

        let feed = parse_feed(xml).unwrap();
        assert_eq!(feed.title, "A & B");
        assert_eq!(feed.items[0].title, "Q&A");
    }
}
