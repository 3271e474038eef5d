//! RSS 2.0 export for the site's own articles

use chrono::Utc;

use crate::content::News;

/// Channel metadata for the generated feed
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub title: String,
    pub description: String,
    /// Site base URL, no trailing slash
    pub link: String,
}

/// Render an RSS 2.0 document for the given articles
///
/// Items carry the article excerpt as description; link and guid both point
/// at the article's public URL.
pub fn render_rss(channel: &ChannelInfo, articles: &[News]) -> String {
    let mut xml = String::with_capacity(1024 + articles.len() * 512);

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<rss version=\"2.0\">\n");
    xml.push_str("<channel>\n");
    push_tag(&mut xml, "title", &channel.title);
    push_tag(&mut xml, "description", &channel.description);
    push_tag(&mut xml, "link", &channel.link);
    push_tag(&mut xml, "lastBuildDate", &Utc::now().to_rfc2822());

    for article in articles {
        let url = format!("{}/news/{}", channel.link, article.slug);

        xml.push_str("<item>\n");
        push_tag(&mut xml, "title", &article.title);
        push_tag(&mut xml, "description", article.excerpt.as_deref().unwrap_or(""));
        push_tag(&mut xml, "link", &url);
        if let Some(published_at) = article.published_at {
            push_tag(&mut xml, "pubDate", &published_at.to_rfc2822());
        }
        push_tag(&mut xml, "guid", &url);
        xml.push_str("</item>\n");
    }

    xml.push_str("</channel>\n");
    xml.push_str("</rss>");

    xml
}

fn push_tag(xml: &mut String, tag: &str, value: &str) {
    xml.push('<');
    xml.push_str(tag);
    xml.push('>');
    xml.push_str(&html_escape::encode_text(value));
    xml.push_str("</");
    xml.push_str(tag);
    xml.push_str(">\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{NewNews, NewsStore};
    use crate::storage::Database;
    use std::sync::Arc;

    fn channel() -> ChannelInfo {
        ChannelInfo {
            title: "News & Views".to_string(),
            description: "Latest from the desk".to_string(),
            link: "https://example.com".to_string(),
        }
    }

    fn published_article(title: &str) -> News {
        let news = NewsStore::new(Arc::new(Database::in_memory().unwrap()));
        let article = news.create(NewNews::new(title, "body text", 1)).unwrap();
        news.publish(article.id).unwrap()
    }

    #[test]
    fn test_rss_envelope() {
        let xml = render_rss(&channel(), &[]);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\">"));
        assert!(xml.contains("<title>News &amp; Views</title>"));
        assert!(xml.contains("<lastBuildDate>"));
        assert!(xml.ends_with("</rss>"));
    }

    #[test]
    fn test_item_fields() {
        let article = published_article("Breaking Story");
        let xml = render_rss(&channel(), &[article]);

        assert!(xml.contains("<item>"));
        assert!(xml.contains("<title>Breaking Story</title>"));
        assert!(xml.contains("<link>https://example.com/news/breaking-story</link>"));
        assert!(xml.contains("<guid>https://example.com/news/breaking-story</guid>"));
        assert!(xml.contains("<pubDate>"));
        assert!(xml.contains("<description>body text</description>"));
    }

    #[test]
    fn test_special_characters_escaped() {
        let article = published_article("Bonds <em>rise</em> & fall");
        let xml = render_rss(&channel(), &[article]);
        assert!(xml.contains("Bonds &lt;em&gt;rise&lt;/em&gt; &amp; fall"));
    }
}
