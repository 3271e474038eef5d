//! Shared fixtures for integration tests

// Each test binary compiles this module separately and uses a subset of it
#![allow(dead_code)]

use std::sync::Arc;

use newsdesk::content::{NewNews, NewsStore};
use newsdesk::engagement::{CommentStore, ReactionStore, ViewStore};
use newsdesk::feed::{FeedFetcher, FeedImporter, FeedStore, NewFeed};
use newsdesk::settings::SettingsStore;
use newsdesk::storage::Database;
use newsdesk::taxonomy::{CategoryStore, NewCategory, TagStore};

/// All stores over one in-memory database
pub struct TestEngine {
    pub db: Arc<Database>,
    pub categories: CategoryStore,
    pub tags: TagStore,
    pub news: NewsStore,
    pub comments: CommentStore,
    pub reactions: ReactionStore,
    pub views: ViewStore,
    pub feeds: FeedStore,
    pub settings: SettingsStore,
}

impl TestEngine {
    pub fn new() -> Self {
        let db = Arc::new(Database::in_memory().unwrap());
        let settings = SettingsStore::new(db.clone());
        settings.initialize_defaults().unwrap();

        Self {
            categories: CategoryStore::new(db.clone()),
            tags: TagStore::new(db.clone()),
            news: NewsStore::new(db.clone()),
            comments: CommentStore::new(db.clone(), settings.clone()),
            reactions: ReactionStore::new(db.clone()),
            views: ViewStore::new(db.clone()),
            feeds: FeedStore::new(db.clone()),
            settings,
            db,
        }
    }

    /// A feed importer wired to this engine's stores
    pub fn importer(&self) -> FeedImporter {
        let fetcher = FeedFetcher::new(100, "newsdesk-test").unwrap();
        FeedImporter::new(self.feeds.clone(), self.news.clone(), fetcher, 1)
    }

    /// Create and publish an article
    pub fn published_article(&self, title: &str, category_id: Option<i64>) -> newsdesk::content::News {
        let article = self
            .news
            .create(NewNews {
                category_id,
                ..NewNews::new(title, format!("Body of {title}"), 1)
            })
            .unwrap();
        self.news.publish(article.id).unwrap()
    }

    /// Create a category under an optional parent
    pub fn category(&self, name: &str, parent_id: Option<i64>) -> newsdesk::taxonomy::Category {
        self.categories
            .create(NewCategory {
                name: name.to_string(),
                parent_id,
                ..Default::default()
            })
            .unwrap()
    }

    /// Subscribe a feed pointing at `url`
    pub fn feed(&self, url: &str, max_items: i64, auto_publish: bool) -> newsdesk::feed::RssFeed {
        self.feeds
            .create(NewFeed {
                name: "Upstream Wire".to_string(),
                url: url.to_string(),
                description: None,
                category_id: None,
                language: None,
                fetch_frequency: None,
                max_items: Some(max_items),
                auto_publish,
                status: None,
            })
            .unwrap()
    }
}

/// A small RSS 2.0 document with the given item links
pub fn rss_document(items: &[(&str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
<title>Upstream Wire</title>
<description>Test feed</description>
<link>https://upstream.example</link>
"#,
    );

    for (title, link) in items {
        xml.push_str(&format!(
            "<item><title>{title}</title><description>Body of {title}</description>\
             <link>{link}</link><pubDate>Tue, 06 Aug 2024 10:30:00 +0000</pubDate></item>\n"
        ));
    }

    xml.push_str("</channel>\n</rss>");
    xml
}
