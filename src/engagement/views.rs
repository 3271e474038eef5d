//! Append-only view analytics
//!
//! Every page view appends an event row with a device/browser/OS
//! classification parsed from the client's user-agent string, and bumps the
//! article's lifetime counter with an atomic column increment.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use rusqlite::params;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::models::Identity;
use crate::storage::{from_db_time, to_db_time, Database};

static MOBILE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Mobile|Android|iPhone|iPad").unwrap());
static TABLET_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Tablet|iPad").unwrap());

/// Device/browser/OS classification derived from a user-agent string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

impl DeviceInfo {
    /// Best-effort user-agent classification
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) else {
            return Self::default();
        };

        let device = if MOBILE_REGEX.is_match(ua) {
            "mobile"
        } else if TABLET_REGEX.is_match(ua) {
            "tablet"
        } else {
            "desktop"
        };

        // Browser checks ordered as the upstream product has them; Edge and
        // Safari UAs that also announce Chrome classify as Chrome.
        let browser = if ua.contains("Chrome") {
            Some("Chrome")
        } else if ua.contains("Firefox") {
            Some("Firefox")
        } else if ua.contains("Safari") {
            Some("Safari")
        } else if ua.contains("Edge") {
            Some("Edge")
        } else {
            None
        };

        let os = if ua.contains("Windows") {
            Some("Windows")
        } else if ua.contains("Mac OS X") {
            Some("macOS")
        } else if ua.contains("Android") {
            Some("Android")
        } else if ua.contains("Linux") {
            Some("Linux")
        } else if ua.contains("iOS") || ua.contains("iPhone") || ua.contains("iPad") {
            Some("iOS")
        } else {
            None
        };

        Self {
            device: Some(device.to_string()),
            browser: browser.map(String::from),
            os: os.map(String::from),
        }
    }
}

/// Context accompanying a recorded view
#[derive(Debug, Clone, Default)]
pub struct ViewContext {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}

/// A recorded view event
#[derive(Debug, Clone, Serialize)]
pub struct NewsView {
    pub id: i64,
    pub news_id: i64,
    pub user_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub device: DeviceInfo,
    pub viewed_at: DateTime<Utc>,
}

/// Aggregated view statistics for an article
#[derive(Debug, Clone, Serialize)]
pub struct ViewStats {
    pub total_views: i64,
    pub unique_visitors: i64,
    pub views_by_device: HashMap<String, i64>,
}

/// Store for view events
#[derive(Clone)]
pub struct ViewStore {
    db: Arc<Database>,
}

impl ViewStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record a view: append the event and atomically bump the article's
    /// lifetime counter
    pub fn record(
        &self,
        news_id: i64,
        identity: &Identity,
        context: &ViewContext,
    ) -> Result<NewsView> {
        let device = DeviceInfo::from_user_agent(context.user_agent.as_deref());
        let (user_id, ip_address) = identity.columns();

        let id = {
            let conn = self.db.conn();

            let updated = conn.execute(
                "UPDATE news SET views_count = views_count + 1
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![news_id],
            )?;
            if updated == 0 {
                return Err(Error::not_found("news", news_id));
            }

            conn.execute(
                r#"
                INSERT INTO news_views (news_id, user_id, ip_address, user_agent, referer,
                                        device, browser, os, viewed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    news_id,
                    user_id,
                    ip_address,
                    context.user_agent,
                    context.referer,
                    device.device,
                    device.browser,
                    device.os,
                    to_db_time(Utc::now()),
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get(id)
    }

    /// View-event count for an article inside the last `days` days
    pub fn count_since(&self, news_id: i64, days: i64) -> Result<i64> {
        let cutoff = Utc::now() - Duration::days(days);
        let conn = self.db.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM news_views WHERE news_id = ?1 AND viewed_at >= ?2",
            params![news_id, to_db_time(cutoff)],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Aggregated statistics for an article
    pub fn stats(&self, news_id: i64) -> Result<ViewStats> {
        let conn = self.db.conn();

        let total_views: i64 = conn.query_row(
            "SELECT COUNT(*) FROM news_views WHERE news_id = ?1",
            params![news_id],
            |row| row.get(0),
        )?;

        let unique_visitors: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT COALESCE('u' || user_id, 'ip' || ip_address))
             FROM news_views WHERE news_id = ?1",
            params![news_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT COALESCE(device, 'unknown'), COUNT(*)
             FROM news_views WHERE news_id = ?1 GROUP BY device",
        )?;
        let views_by_device = stmt
            .query_map(params![news_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(ViewStats {
            total_views,
            unique_visitors,
            views_by_device,
        })
    }

    fn get(&self, id: i64) -> Result<NewsView> {
        let conn = self.db.conn();
        let view = conn.query_row(
            "SELECT id, news_id, user_id, ip_address, user_agent, referer,
                    device, browser, os, viewed_at
             FROM news_views WHERE id = ?1",
            params![id],
            |row| {
                Ok(NewsView {
                    id: row.get(0)?,
                    news_id: row.get(1)?,
                    user_id: row.get(2)?,
                    ip_address: row.get(3)?,
                    user_agent: row.get(4)?,
                    referer: row.get(5)?,
                    device: DeviceInfo {
                        device: row.get(6)?,
                        browser: row.get(7)?,
                        os: row.get(8)?,
                    },
                    viewed_at: from_db_time(&row.get::<_, String>(9)?),
                })
            },
        )?;
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{NewNews, NewsStore};

    const CHROME_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const ANDROID_MOBILE: &str = "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";

    fn fixture() -> (Arc<Database>, ViewStore, i64) {
        let db = Arc::new(Database::in_memory().unwrap());
        let news = NewsStore::new(db.clone());
        let article = news.create(NewNews::new("Article", "body", 1)).unwrap();
        (db.clone(), ViewStore::new(db), article.id)
    }

    #[test]
    fn test_device_classification() {
        let desktop = DeviceInfo::from_user_agent(Some(CHROME_DESKTOP));
        assert_eq!(desktop.device.as_deref(), Some("desktop"));
        assert_eq!(desktop.browser.as_deref(), Some("Chrome"));
        assert_eq!(desktop.os.as_deref(), Some("Windows"));

        let mobile = DeviceInfo::from_user_agent(Some(ANDROID_MOBILE));
        assert_eq!(mobile.device.as_deref(), Some("mobile"));
        assert_eq!(mobile.os.as_deref(), Some("Android"));
    }

    #[test]
    fn test_empty_user_agent() {
        let info = DeviceInfo::from_user_agent(None);
        assert_eq!(info, DeviceInfo::default());
    }

    #[test]
    fn test_record_increments_views_count() {
        let (db, views, news_id) = fixture();
        let news = NewsStore::new(db);

        for i in 0..3 {
            views
                .record(
                    news_id,
                    &Identity::anonymous(format!("203.0.113.{i}")),
                    &ViewContext {
                        user_agent: Some(CHROME_DESKTOP.to_string()),
                        referer: None,
                    },
                )
                .unwrap();
        }

        assert_eq!(news.get(news_id).unwrap().views_count, 3);
    }

    #[test]
    fn test_stats_unique_visitors() {
        let (_db, views, news_id) = fixture();

        let repeat = Identity::registered(1);
        views.record(news_id, &repeat, &ViewContext::default()).unwrap();
        views.record(news_id, &repeat, &ViewContext::default()).unwrap();
        views
            .record(news_id, &Identity::anonymous("203.0.113.9"), &ViewContext::default())
            .unwrap();

        let stats = views.stats(news_id).unwrap();
        assert_eq!(stats.total_views, 3);
        assert_eq!(stats.unique_visitors, 2);
    }

    #[test]
    fn test_record_on_missing_article() {
        let (_db, views, _) = fixture();
        let err = views
            .record(999, &Identity::registered(1), &ViewContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_count_since_window() {
        let (db, views, news_id) = fixture();
        views
            .record(news_id, &Identity::registered(1), &ViewContext::default())
            .unwrap();

        // Backdate one event outside the window
        {
            let conn = db.conn();
            conn.execute(
                "INSERT INTO news_views (news_id, viewed_at) VALUES (?1, ?2)",
                params![news_id, to_db_time(Utc::now() - Duration::days(30))],
            )
            .unwrap();
        }

        assert_eq!(views.count_since(news_id, 7).unwrap(), 1);
    }
}
