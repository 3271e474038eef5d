//! SQLite persistence layer
//!
//! All domain stores share a single [`Database`] handle wrapping a
//! `Mutex<Connection>`. Counter updates go through atomic SQL increments,
//! never read-modify-write in application code.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::Result;

/// Shared database handle
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite database initialized");
        Ok(db)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.create_schema()?;
        Ok(db)
    }

    /// Lock and borrow the underlying connection
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT,
                parent_id INTEGER REFERENCES categories(id),
                sort_order INTEGER NOT NULL DEFAULT 0,
                language TEXT NOT NULL DEFAULT 'en',
                is_active INTEGER NOT NULL DEFAULT 1,
                meta TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_categories_parent
                ON categories(parent_id);

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS media (
                id INTEGER PRIMARY KEY,
                media_type TEXT NOT NULL,
                title TEXT,
                original_name TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                disk TEXT NOT NULL DEFAULT 'local',
                mime_type TEXT,
                file_size INTEGER NOT NULL DEFAULT 0,
                width INTEGER,
                height INTEGER,
                alt_text TEXT,
                is_visible INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                excerpt TEXT,
                content TEXT NOT NULL DEFAULT '',
                language TEXT NOT NULL DEFAULT 'en',
                status TEXT NOT NULL DEFAULT 'draft',
                published_at TEXT,
                is_featured INTEGER NOT NULL DEFAULT 0,
                allow_comments INTEGER NOT NULL DEFAULT 1,
                author_id INTEGER NOT NULL,
                category_id INTEGER REFERENCES categories(id),
                featured_image_id INTEGER REFERENCES media(id),
                meta_title TEXT,
                meta_description TEXT,
                meta_keywords TEXT,
                views_count INTEGER NOT NULL DEFAULT 0,
                source_url TEXT UNIQUE,
                source_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                deleted_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_news_status_published
                ON news(status, published_at);

            CREATE INDEX IF NOT EXISTS idx_news_category
                ON news(category_id);

            CREATE INDEX IF NOT EXISTS idx_news_source_url
                ON news(source_url);

            CREATE TABLE IF NOT EXISTS news_tags (
                news_id INTEGER NOT NULL REFERENCES news(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id),
                PRIMARY KEY (news_id, tag_id)
            );

            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                news_id INTEGER NOT NULL REFERENCES news(id) ON DELETE CASCADE,
                user_id INTEGER,
                guest_name TEXT,
                guest_email TEXT,
                ip_address TEXT,
                parent_id INTEGER REFERENCES comments(id),
                content TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                is_pinned INTEGER NOT NULL DEFAULT 0,
                likes_count INTEGER NOT NULL DEFAULT 0,
                replies_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_comments_news_status
                ON comments(news_id, status);

            CREATE INDEX IF NOT EXISTS idx_comments_parent
                ON comments(parent_id);

            CREATE TABLE IF NOT EXISTS likes (
                id INTEGER PRIMARY KEY,
                news_id INTEGER NOT NULL REFERENCES news(id) ON DELETE CASCADE,
                user_id INTEGER,
                visitor_ip TEXT,
                reaction TEXT NOT NULL DEFAULT 'like',
                created_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_news_user
                ON likes(news_id, user_id) WHERE user_id IS NOT NULL;

            CREATE UNIQUE INDEX IF NOT EXISTS idx_likes_news_ip
                ON likes(news_id, visitor_ip) WHERE user_id IS NULL;

            CREATE INDEX IF NOT EXISTS idx_likes_news_reaction
                ON likes(news_id, reaction);

            CREATE TABLE IF NOT EXISTS news_views (
                id INTEGER PRIMARY KEY,
                news_id INTEGER NOT NULL REFERENCES news(id) ON DELETE CASCADE,
                user_id INTEGER,
                ip_address TEXT,
                user_agent TEXT,
                referer TEXT,
                device TEXT,
                browser TEXT,
                os TEXT,
                viewed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_news_views_news_time
                ON news_views(news_id, viewed_at);

            CREATE TABLE IF NOT EXISTS rss_feeds (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                description TEXT,
                category_id INTEGER REFERENCES categories(id),
                status TEXT NOT NULL DEFAULT 'active',
                language TEXT NOT NULL DEFAULT 'en',
                fetch_frequency INTEGER NOT NULL DEFAULT 60,
                max_items INTEGER NOT NULL DEFAULT 10,
                auto_publish INTEGER NOT NULL DEFAULT 0,
                total_items_fetched INTEGER NOT NULL DEFAULT 0,
                error_count INTEGER NOT NULL DEFAULT 0,
                last_fetched_at TEXT,
                last_successful_fetch_at TEXT,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS advertisements (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                rate REAL NOT NULL DEFAULT 0,
                rate_type TEXT NOT NULL DEFAULT 'fixed',
                media_id INTEGER REFERENCES media(id),
                html_content TEXT,
                click_url TEXT,
                position TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'active',
                starts_at TEXT,
                expires_at TEXT,
                impressions INTEGER NOT NULL DEFAULT 0,
                clicks INTEGER NOT NULL DEFAULT 0,
                click_rate REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ads_status_position
                ON advertisements(status, position);

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY,
                key TEXT NOT NULL UNIQUE,
                value TEXT NOT NULL,
                value_type TEXT NOT NULL DEFAULT 'string',
                description TEXT,
                setting_group TEXT NOT NULL DEFAULT 'general',
                is_public INTEGER NOT NULL DEFAULT 0,
                is_autoload INTEGER NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )?;

        Ok(())
    }
}

/// Format a timestamp for storage
pub(crate) fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse a stored timestamp, falling back to now on corruption
pub(crate) fn from_db_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse an optional stored timestamp
pub(crate) fn from_db_time_opt(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().map(from_db_time)
}

/// Check whether a rusqlite error is a UNIQUE constraint violation
///
/// Used to turn duplicate slugs/urls into conflict errors, and by the
/// reaction toggle to detect a row created by a concurrent request.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_schema() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('categories', 'tags', 'media', 'news', 'news_tags', 'comments',
                  'likes', 'news_views', 'rss_feeds', 'advertisements', 'settings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 11);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("news.db");
        let db = Database::open(&path);
        assert!(db.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_time_round_trip() {
        let now = Utc::now();
        let parsed = from_db_time(&to_db_time(now));
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_corrupt_time_falls_back() {
        // Should not panic on garbage
        let _ = from_db_time("not-a-date");
        assert_eq!(from_db_time_opt(None), None);
    }
}
