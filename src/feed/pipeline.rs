//! Fetch, dedupe and import orchestration
//!
//! Each fetch is synchronous from the caller's perspective: GET with a
//! bounded timeout, parse, truncate to the feed's item cap, then import
//! items in source order, skipping any link that already exists as an
//! article's source_url. Success and failure both update the feed's
//! bookkeeping; a failure never deactivates the feed.

use chrono::Utc;
use serde::Serialize;

use crate::content::{NewNews, NewsStore};
use crate::error::Result;
use crate::models::NewsStatus;
use crate::utils::text::excerpt;

use super::parser::{parse_feed, ParsedFeed};
use super::{FeedFetcher, FeedStore, RssFeed};

/// Result of a single feed fetch
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FetchOutcome {
    /// Items extracted from the payload (after the per-fetch cap)
    pub items_found: usize,
    /// Items imported as new articles
    pub items_imported: usize,
}

/// Per-feed result of a bulk fetch
#[derive(Debug, Clone, Serialize)]
pub struct BulkFetchResult {
    pub feed_id: i64,
    pub feed_name: String,
    pub outcome: std::result::Result<FetchOutcome, String>,
}

/// Validity probe for a feed URL
#[derive(Debug, Clone, Serialize)]
pub struct FeedProbe {
    pub kind: &'static str,
    pub title: String,
    pub description: String,
    pub link: String,
    pub items_found: usize,
}

/// Imports external feed items as articles
pub struct FeedImporter {
    feeds: FeedStore,
    news: NewsStore,
    fetcher: FeedFetcher,
    /// Author assigned to imported articles
    import_author_id: i64,
}

impl FeedImporter {
    pub fn new(feeds: FeedStore, news: NewsStore, fetcher: FeedFetcher, import_author_id: i64) -> Self {
        Self {
            feeds,
            news,
            fetcher,
            import_author_id,
        }
    }

    /// Fetch one feed and import its new items
    ///
    /// On failure the feed's status flips to `error`, its error counter and
    /// message are updated, last_fetched_at is left untouched, and the
    /// error propagates to the caller.
    pub async fn fetch_one(&self, feed_id: i64) -> Result<FetchOutcome> {
        let feed = self.feeds.get(feed_id)?;

        match self.fetch_and_import(&feed).await {
            Ok(outcome) => {
                self.feeds
                    .record_success(feed.id, outcome.items_imported as i64)?;
                tracing::info!(
                    feed_id = feed.id,
                    feed = %feed.name,
                    items_found = outcome.items_found,
                    items_imported = outcome.items_imported,
                    "feed fetched"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.feeds.record_failure(feed.id, &err.to_string())?;
                tracing::warn!(feed_id = feed.id, feed = %feed.name, error = %err, "feed fetch failed");
                Err(err)
            }
        }
    }

    /// Fetch every active feed sequentially, isolating failures per feed
    pub async fn fetch_all(&self) -> Result<Vec<BulkFetchResult>> {
        let feeds = self.feeds.list(Some(crate::models::FeedStatus::Active))?;
        let mut results = Vec::with_capacity(feeds.len());

        for feed in feeds {
            let outcome = self
                .fetch_one(feed.id)
                .await
                .map_err(|e| e.to_string());
            results.push(BulkFetchResult {
                feed_id: feed.id,
                feed_name: feed.name,
                outcome,
            });
        }

        Ok(results)
    }

    /// Fetch only the active feeds whose scheduled time has passed
    pub async fn fetch_due(&self) -> Result<Vec<BulkFetchResult>> {
        let feeds = self.feeds.due_for_fetch(Utc::now())?;
        let mut results = Vec::with_capacity(feeds.len());

        for feed in feeds {
            let outcome = self
                .fetch_one(feed.id)
                .await
                .map_err(|e| e.to_string());
            results.push(BulkFetchResult {
                feed_id: feed.id,
                feed_name: feed.name,
                outcome,
            });
        }

        Ok(results)
    }

    /// Probe a URL without importing anything
    pub async fn test_url(&self, url: &str) -> Result<FeedProbe> {
        let body = self.fetcher.fetch(url).await?;
        let parsed = parse_feed(&body)?;

        Ok(FeedProbe {
            kind: parsed.kind.as_str(),
            title: parsed.title,
            description: parsed.description,
            link: parsed.link,
            items_found: parsed.items.len(),
        })
    }

    async fn fetch_and_import(&self, feed: &RssFeed) -> Result<FetchOutcome> {
        let body = self.fetcher.fetch(&feed.url).await?;
        let parsed: ParsedFeed = parse_feed(&body)?;

        let max_items = feed.max_items.max(0) as usize;

        // Cap the work per fetch before any dedup or import happens
        let items: Vec<_> = parsed.items.into_iter().take(max_items).collect();
        let items_found = items.len();
        let mut items_imported = 0usize;

        for item in items {
            // Items without a link have no dedup key; skip them outright
            if item.link.is_empty() {
                continue;
            }

            // Expected, silent skip: this link was already imported
            if self.news.exists_by_source_url(&item.link)? {
                continue;
            }

            let status = if feed.auto_publish {
                NewsStatus::Published
            } else {
                NewsStatus::Draft
            };

            let new_article = NewNews {
                title: item.title,
                slug: None,
                excerpt: Some(excerpt(&item.description)),
                content: item.description,
                language: Some(feed.language.clone()),
                status: Some(status),
                published_at: feed.auto_publish.then(Utc::now),
                is_featured: false,
                allow_comments: None,
                author_id: self.import_author_id,
                category_id: feed.category_id,
                featured_image_id: None,
                meta_title: None,
                meta_description: None,
                meta_keywords: Vec::new(),
                source_url: Some(item.link),
                source_name: Some(feed.name.clone()),
            };

            match self.news.create(new_article.clone()) {
                Ok(_) => {}
                // A different article already owns this slug; disambiguate
                // once instead of failing the whole fetch
                Err(crate::error::Error::Conflict(_)) => {
                    let deduped = NewNews {
                        slug: Some(format!(
                            "{}-{}",
                            crate::utils::text::slugify(&new_article.title),
                            Utc::now().timestamp()
                        )),
                        ..new_article
                    };
                    self.news.create(deduped)?;
                }
                Err(e) => return Err(e),
            }

            items_imported += 1;

            // The list is already truncated, but never import past the
            // configured cap either way
            if items_imported >= max_items {
                break;
            }
        }

        Ok(FetchOutcome {
            items_found,
            items_imported,
        })
    }
}
