//! RSS ingestion pipeline
//!
//! - [`fetcher`] - outbound HTTP with bounded timeout and rate limiting
//! - [`parser`] - RSS 2.0 / Atom XML parsing
//! - [`pipeline`] - fetch, dedupe and import orchestration
//! - [`export`] - RSS 2.0 generation for the site's own feed
//!
//! A feed's status reflects its last fetch: success forces `active` and
//! clears the recorded error; any transport or format failure sets `error`
//! and increments the error counter, but never deactivates the feed; it
//! stays eligible for the next scheduled or manual attempt.

pub mod export;
pub mod fetcher;
pub mod parser;
pub mod pipeline;

pub use fetcher::FeedFetcher;
pub use parser::{FeedItem, FeedKind, ParsedFeed};
pub use pipeline::{BulkFetchResult, FeedImporter, FeedProbe, FetchOutcome};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::models::{FeedHealth, FeedStatus};
use crate::storage::{from_db_time, from_db_time_opt, is_unique_violation, to_db_time, Database};

/// A subscribed RSS/Atom feed
#[derive(Debug, Clone, Serialize)]
pub struct RssFeed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub status: FeedStatus,
    pub language: String,
    /// Minutes between scheduled fetches
    pub fetch_frequency: i64,
    /// Cap on items considered per fetch
    pub max_items: i64,
    pub auto_publish: bool,
    pub total_items_fetched: i64,
    pub error_count: i64,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_successful_fetch_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RssFeed {
    /// When the next scheduled fetch is due
    pub fn next_fetch_at(&self) -> DateTime<Utc> {
        match self.last_fetched_at {
            Some(at) => at + Duration::minutes(self.fetch_frequency),
            None => Utc::now(),
        }
    }

    /// Active and past its next scheduled fetch time
    pub fn is_ready_for_fetch(&self, now: DateTime<Utc>) -> bool {
        self.status == FeedStatus::Active
            && self
                .last_fetched_at
                .map(|_| self.next_fetch_at() <= now)
                .unwrap_or(true)
    }

    /// Items delivered versus errors, floored at zero, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_items_fetched == 0 {
            return 0.0;
        }

        let successful = (self.total_items_fetched - self.error_count).max(0);
        let rate = successful as f64 / self.total_items_fetched as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }

    /// Derived reliability label; never persisted
    pub fn health(&self) -> FeedHealth {
        if self.status != FeedStatus::Active {
            return FeedHealth::Inactive;
        }

        if self.error_count > 10 {
            return FeedHealth::Poor;
        }
        if self.error_count > 5 {
            return FeedHealth::Fair;
        }

        let rate = self.success_rate();
        if rate > 95.0 {
            FeedHealth::Excellent
        } else if rate > 80.0 {
            FeedHealth::Good
        } else {
            FeedHealth::Fair
        }
    }
}

/// Fields for subscribing a feed
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub language: Option<String>,
    pub fetch_frequency: Option<i64>,
    pub max_items: Option<i64>,
    #[serde(default)]
    pub auto_publish: bool,
    pub status: Option<FeedStatus>,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Option<i64>>,
    pub language: Option<String>,
    pub fetch_frequency: Option<i64>,
    pub max_items: Option<i64>,
    pub auto_publish: Option<bool>,
    pub status: Option<FeedStatus>,
}

/// Aggregate feed statistics
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatistics {
    pub total_feeds: i64,
    pub active_feeds: i64,
    pub inactive_feeds: i64,
    pub error_feeds: i64,
    pub total_items_fetched: i64,
}

/// Store for feed subscriptions
#[derive(Clone)]
pub struct FeedStore {
    db: Arc<Database>,
}

impl FeedStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Subscribe a feed; the URL must parse and be unique
    pub fn create(&self, new: NewFeed) -> Result<RssFeed> {
        if new.name.trim().is_empty() {
            return Err(Error::validation("feed name must not be empty"));
        }
        Url::parse(&new.url)
            .map_err(|_| Error::validation(format!("invalid feed url: {}", new.url)))?;

        let now = to_db_time(Utc::now());
        let id = {
            let conn = self.db.conn();
            conn.execute(
                r#"
                INSERT INTO rss_feeds (name, url, description, category_id, status, language,
                                       fetch_frequency, max_items, auto_publish, created_at,
                                       updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                "#,
                params![
                    new.name,
                    new.url,
                    new.description,
                    new.category_id,
                    new.status.unwrap_or(FeedStatus::Active).as_str(),
                    new.language.unwrap_or_else(|| "en".into()),
                    new.fetch_frequency.unwrap_or(60),
                    new.max_items.unwrap_or(10),
                    new.auto_publish,
                    now,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(format!("feed url already subscribed: {}", new.url))
                } else {
                    e.into()
                }
            })?;
            conn.last_insert_rowid()
        };

        self.get(id)
    }

    pub fn update(&self, id: i64, update: FeedUpdate) -> Result<RssFeed> {
        let current = self.get(id)?;

        let url = update.url.unwrap_or(current.url);
        Url::parse(&url).map_err(|_| Error::validation(format!("invalid feed url: {url}")))?;

        {
            let conn = self.db.conn();
            conn.execute(
                r#"
                UPDATE rss_feeds
                SET name = ?1, url = ?2, description = ?3, category_id = ?4, status = ?5,
                    language = ?6, fetch_frequency = ?7, max_items = ?8, auto_publish = ?9,
                    updated_at = ?10
                WHERE id = ?11
                "#,
                params![
                    update.name.unwrap_or(current.name),
                    url,
                    update.description.or(current.description),
                    match update.category_id {
                        Some(v) => v,
                        None => current.category_id,
                    },
                    update.status.unwrap_or(current.status).as_str(),
                    update.language.unwrap_or(current.language),
                    update.fetch_frequency.unwrap_or(current.fetch_frequency),
                    update.max_items.unwrap_or(current.max_items),
                    update.auto_publish.unwrap_or(current.auto_publish),
                    to_db_time(Utc::now()),
                    id,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(format!("feed url already subscribed: {url}"))
                } else {
                    e.into()
                }
            })?;
        }

        self.get(id)
    }

    /// Unsubscribe a feed; imported articles keep their provenance fields
    pub fn delete(&self, id: i64) -> Result<()> {
        self.get(id)?;
        let conn = self.db.conn();
        conn.execute("DELETE FROM rss_feeds WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<RssFeed> {
        let conn = self.db.conn();
        conn.query_row(&format!("{SELECT_FEED} WHERE id = ?1"), params![id], map_feed)
            .optional()?
            .ok_or_else(|| Error::not_found("rss feed", id))
    }

    pub fn list(&self, status: Option<FeedStatus>) -> Result<Vec<RssFeed>> {
        let mut sql = format!("{SELECT_FEED} WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str()));
        }
        sql.push_str(" ORDER BY name");

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), map_feed)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Active feeds whose scheduled fetch time has passed
    pub fn due_for_fetch(&self, now: DateTime<Utc>) -> Result<Vec<RssFeed>> {
        Ok(self
            .list(Some(FeedStatus::Active))?
            .into_iter()
            .filter(|feed| feed.is_ready_for_fetch(now))
            .collect())
    }

    /// Record a completed fetch: force active, clear the error, stamp both
    /// fetch timestamps and add the imported count to the lifetime total
    pub fn record_success(&self, id: i64, items_imported: i64) -> Result<RssFeed> {
        self.get(id)?;
        {
            let now = to_db_time(Utc::now());
            let conn = self.db.conn();
            conn.execute(
                "UPDATE rss_feeds
                 SET status = 'active',
                     last_fetched_at = ?1,
                     last_successful_fetch_at = ?1,
                     last_error = NULL,
                     total_items_fetched = total_items_fetched + ?2,
                     updated_at = ?1
                 WHERE id = ?3",
                params![now, items_imported, id],
            )?;
        }
        self.get(id)
    }

    /// Record a failed fetch: error status, error counter up, message kept.
    /// last_fetched_at is not touched; it means "last completed fetch".
    pub fn record_failure(&self, id: i64, error: &str) -> Result<RssFeed> {
        self.get(id)?;
        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE rss_feeds
                 SET status = 'error',
                     error_count = error_count + 1,
                     last_error = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![error, to_db_time(Utc::now()), id],
            )?;
        }
        self.get(id)
    }

    /// Clear the error counter and message
    pub fn reset_errors(&self, id: i64) -> Result<RssFeed> {
        self.get(id)?;
        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE rss_feeds SET error_count = 0, last_error = NULL, updated_at = ?1
                 WHERE id = ?2",
                params![to_db_time(Utc::now()), id],
            )?;
        }
        self.get(id)
    }

    /// Clone a subscription with counters reset; the copy starts inactive
    pub fn duplicate(&self, id: i64) -> Result<RssFeed> {
        let source = self.get(id)?;
        self.create(NewFeed {
            name: format!("{} (Copy)", source.name),
            // A URL can only be subscribed once; the copy gets a fragment
            // marker the operator is expected to edit.
            url: format!("{}#copy-{}", source.url, source.id),
            description: source.description,
            category_id: source.category_id,
            language: Some(source.language),
            fetch_frequency: Some(source.fetch_frequency),
            max_items: Some(source.max_items),
            auto_publish: source.auto_publish,
            status: Some(FeedStatus::Inactive),
        })
    }

    /// Aggregate statistics across all subscriptions
    pub fn statistics(&self) -> Result<FeedStatistics> {
        let conn = self.db.conn();
        let (total, active, inactive, error, items) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'active'), 0),
                    COALESCE(SUM(status = 'inactive'), 0),
                    COALESCE(SUM(status = 'error' OR error_count > 0), 0),
                    COALESCE(SUM(total_items_fetched), 0)
             FROM rss_feeds",
            [],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;

        Ok(FeedStatistics {
            total_feeds: total,
            active_feeds: active,
            inactive_feeds: inactive,
            error_feeds: error,
            total_items_fetched: items,
        })
    }
}

const SELECT_FEED: &str = "SELECT id, name, url, description, category_id, status,
    language, fetch_frequency, max_items, auto_publish, total_items_fetched,
    error_count, last_fetched_at, last_successful_fetch_at, last_error, created_at,
    updated_at FROM rss_feeds";

fn map_feed(row: &Row<'_>) -> rusqlite::Result<RssFeed> {
    let status: String = row.get(5)?;
    Ok(RssFeed {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        description: row.get(3)?,
        category_id: row.get(4)?,
        status: FeedStatus::parse(&status).unwrap_or(FeedStatus::Inactive),
        language: row.get(6)?,
        fetch_frequency: row.get(7)?,
        max_items: row.get(8)?,
        auto_publish: row.get(9)?,
        total_items_fetched: row.get(10)?,
        error_count: row.get(11)?,
        last_fetched_at: from_db_time_opt(row.get(12)?),
        last_successful_fetch_at: from_db_time_opt(row.get(13)?),
        last_error: row.get(14)?,
        created_at: from_db_time(&row.get::<_, String>(15)?),
        updated_at: from_db_time(&row.get::<_, String>(16)?),
    })
}
