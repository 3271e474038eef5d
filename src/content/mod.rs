//! Article lifecycle and query engine
//!
//! The publication state machine is deliberately permissive: any status is
//! reachable from any other by direct assignment. Public visibility is a
//! compound predicate (status is `published` AND published_at has passed),
//! so a published article with a future timestamp is a scheduled publish,
//! invisible until then. Every public-facing query in this module gates on
//! that predicate, not on the status column alone.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::NewsStatus;
use crate::storage::{from_db_time, from_db_time_opt, is_unique_violation, to_db_time, Database};
use crate::taxonomy::Tag;
use crate::utils::text::{excerpt, slugify, word_count};

/// Words per minute assumed for the reading-time estimate
const READING_SPEED_WPM: usize = 200;

/// A news article
#[derive(Debug, Clone, Serialize)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub language: String,
    pub status: NewsStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub is_featured: bool,
    pub allow_comments: bool,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub featured_image_id: Option<i64>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Vec<String>,
    pub views_count: i64,
    pub source_url: Option<String>,
    pub source_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl News {
    /// Public visibility: published status with a publication time in the past
    pub fn is_effectively_published(&self, now: DateTime<Utc>) -> bool {
        self.status == NewsStatus::Published
            && self.published_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Reading time estimate in minutes, never below one
    pub fn reading_time(&self) -> usize {
        word_count(&self.content).div_ceil(READING_SPEED_WPM).max(1)
    }
}

/// Fields for creating an article
#[derive(Debug, Clone, Deserialize)]
pub struct NewNews {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    pub language: Option<String>,
    pub status: Option<NewsStatus>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_featured: bool,
    pub allow_comments: Option<bool>,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub featured_image_id: Option<i64>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[serde(default)]
    pub meta_keywords: Vec<String>,
    pub source_url: Option<String>,
    pub source_name: Option<String>,
}

impl NewNews {
    pub fn new(title: impl Into<String>, content: impl Into<String>, author_id: i64) -> Self {
        Self {
            title: title.into(),
            slug: None,
            excerpt: None,
            content: content.into(),
            language: None,
            status: None,
            published_at: None,
            is_featured: false,
            allow_comments: None,
            author_id,
            category_id: None,
            featured_image_id: None,
            meta_title: None,
            meta_description: None,
            meta_keywords: Vec::new(),
            source_url: None,
            source_name: None,
        }
    }
}

/// Partial update for an article; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub language: Option<String>,
    pub status: Option<NewsStatus>,
    pub published_at: Option<Option<DateTime<Utc>>>,
    pub is_featured: Option<bool>,
    pub allow_comments: Option<bool>,
    pub category_id: Option<Option<i64>>,
    pub featured_image_id: Option<Option<i64>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<Vec<String>>,
}

/// Sort order for article listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewsOrder {
    /// Most recently published first
    #[default]
    Latest,
    /// Most viewed (lifetime counter) first
    Popular,
}

/// Filters for listing articles
#[derive(Debug, Clone, Default)]
pub struct NewsQuery {
    pub status: Option<NewsStatus>,
    /// Restrict to publicly visible articles
    pub effectively_published: bool,
    /// Scope to these category ids (pair with `CategoryStore::descendant_ids`
    /// to include subcategories)
    pub category_ids: Vec<i64>,
    pub author_id: Option<i64>,
    pub language: Option<String>,
    pub featured_only: bool,
    /// Case-insensitive substring across title, excerpt and content
    pub search: Option<String>,
    pub order: NewsOrder,
    pub limit: Option<usize>,
    pub offset: usize,
}

/// An article with its view count inside the trending window
#[derive(Debug, Clone, Serialize)]
pub struct TrendingArticle {
    #[serde(flatten)]
    pub news: News,
    pub recent_views: i64,
}

/// Store for article operations
#[derive(Clone)]
pub struct NewsStore {
    db: Arc<Database>,
}

impl NewsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create an article
    ///
    /// Derives the slug from the title and the excerpt from stripped
    /// content when absent; entering `published` without an explicit
    /// timestamp stamps the current time.
    pub fn create(&self, new: NewNews) -> Result<News> {
        if new.title.trim().is_empty() {
            return Err(Error::validation("article title must not be empty"));
        }

        let status = new.status.unwrap_or(NewsStatus::Draft);
        let slug = match new.slug.filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None => slugify(&new.title),
        };

        let derived_excerpt = match new.excerpt.filter(|e| !e.is_empty()) {
            Some(e) => Some(e),
            None if !new.content.is_empty() => Some(excerpt(&new.content)),
            None => None,
        };

        let published_at = match (status, new.published_at) {
            (NewsStatus::Published, None) => Some(Utc::now()),
            (_, explicit) => explicit,
        };

        let now = to_db_time(Utc::now());
        let keywords = serde_json::to_string(&new.meta_keywords)?;

        let id = {
            let conn = self.db.conn();
            conn.execute(
                r#"
                INSERT INTO news (title, slug, excerpt, content, language, status,
                                  published_at, is_featured, allow_comments, author_id,
                                  category_id, featured_image_id, meta_title,
                                  meta_description, meta_keywords, source_url,
                                  source_name, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                        ?15, ?16, ?17, ?18, ?18)
                "#,
                params![
                    new.title,
                    slug,
                    derived_excerpt,
                    new.content,
                    new.language.unwrap_or_else(|| "en".into()),
                    status.as_str(),
                    published_at.map(to_db_time),
                    new.is_featured,
                    new.allow_comments.unwrap_or(true),
                    new.author_id,
                    new.category_id,
                    new.featured_image_id,
                    new.meta_title,
                    new.meta_description,
                    keywords,
                    new.source_url,
                    new.source_name,
                    now,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(format!("article slug or source url already in use: {slug}"))
                } else {
                    e.into()
                }
            })?;
            conn.last_insert_rowid()
        };

        tracing::debug!(news_id = id, slug = %slug, status = %status, "article created");
        self.get(id)
    }

    /// Update an article
    ///
    /// The slug is re-derived only when it is still empty and the title
    /// changed; the excerpt only while empty and content is present.
    pub fn update(&self, id: i64, update: NewsUpdate) -> Result<News> {
        let current = self.get(id)?;

        let title_changed = update
            .title
            .as_ref()
            .map(|t| *t != current.title)
            .unwrap_or(false);
        let title = update.title.unwrap_or(current.title);

        let slug = match update.slug.filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None if current.slug.is_empty() && title_changed => slugify(&title),
            None => current.slug,
        };

        let content = update.content.unwrap_or(current.content);
        let new_excerpt = match update.excerpt.filter(|e| !e.is_empty()) {
            Some(e) => Some(e),
            None => match &current.excerpt {
                Some(e) if !e.is_empty() => Some(e.clone()),
                _ if !content.is_empty() => Some(excerpt(&content)),
                _ => None,
            },
        };

        let status = update.status.unwrap_or(current.status);
        let published_at = match update.published_at {
            Some(explicit) => explicit,
            None => current.published_at,
        };
        // Transitioning into published without a timestamp stamps now
        let published_at = if status == NewsStatus::Published && published_at.is_none() {
            Some(Utc::now())
        } else {
            published_at
        };

        let keywords =
            serde_json::to_string(&update.meta_keywords.unwrap_or(current.meta_keywords))?;

        {
            let conn = self.db.conn();
            conn.execute(
                r#"
                UPDATE news
                SET title = ?1, slug = ?2, excerpt = ?3, content = ?4, language = ?5,
                    status = ?6, published_at = ?7, is_featured = ?8,
                    allow_comments = ?9, category_id = ?10, featured_image_id = ?11,
                    meta_title = ?12, meta_description = ?13, meta_keywords = ?14,
                    updated_at = ?15
                WHERE id = ?16 AND deleted_at IS NULL
                "#,
                params![
                    title,
                    slug,
                    new_excerpt,
                    content,
                    update.language.unwrap_or(current.language),
                    status.as_str(),
                    published_at.map(to_db_time),
                    update.is_featured.unwrap_or(current.is_featured),
                    update.allow_comments.unwrap_or(current.allow_comments),
                    match update.category_id {
                        Some(v) => v,
                        None => current.category_id,
                    },
                    match update.featured_image_id {
                        Some(v) => v,
                        None => current.featured_image_id,
                    },
                    update.meta_title.or(current.meta_title),
                    update.meta_description.or(current.meta_description),
                    keywords,
                    to_db_time(Utc::now()),
                    id,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(format!("article slug already in use: {slug}"))
                } else {
                    e.into()
                }
            })?;
        }

        self.get(id)
    }

    /// Direct status assignment; any state is reachable from any other
    pub fn set_status(&self, id: i64, status: NewsStatus) -> Result<News> {
        self.update(
            id,
            NewsUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
    }

    /// Publish, stamping published_at when it is not already set
    pub fn publish(&self, id: i64) -> Result<News> {
        self.set_status(id, NewsStatus::Published)
    }

    pub fn archive(&self, id: i64) -> Result<News> {
        self.set_status(id, NewsStatus::Archived)
    }

    pub fn make_draft(&self, id: i64) -> Result<News> {
        self.set_status(id, NewsStatus::Draft)
    }

    /// Soft-delete an article; it disappears from every query
    pub fn delete(&self, id: i64) -> Result<()> {
        self.get(id)?;
        let conn = self.db.conn();
        conn.execute(
            "UPDATE news SET deleted_at = ?1 WHERE id = ?2",
            params![to_db_time(Utc::now()), id],
        )?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<News> {
        let conn = self.db.conn();
        conn.query_row(
            &format!("{SELECT_NEWS} WHERE id = ?1 AND deleted_at IS NULL"),
            params![id],
            map_news,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("news", id))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<News> {
        let conn = self.db.conn();
        conn.query_row(
            &format!("{SELECT_NEWS} WHERE slug = ?1 AND deleted_at IS NULL"),
            params![slug],
            map_news,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("news", slug))
    }

    /// Whether an article imported from `source_url` already exists
    ///
    /// The dedup key for RSS imports; also matches soft-deleted rows so a
    /// deleted import is not silently re-created on the next fetch.
    pub fn exists_by_source_url(&self, source_url: &str) -> Result<bool> {
        let conn = self.db.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM news WHERE source_url = ?1)",
            params![source_url],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// List articles
    pub fn list(&self, query: &NewsQuery) -> Result<Vec<News>> {
        let mut sql = format!("{SELECT_NEWS} WHERE deleted_at IS NULL");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str()));
        }
        if query.effectively_published {
            sql.push_str(" AND status = 'published' AND published_at <= ?");
            args.push(Box::new(to_db_time(Utc::now())));
        }
        if !query.category_ids.is_empty() {
            let placeholders: String = query
                .category_ids
                .iter()
                .map(|_| "?")
                .collect::<Vec<_>>()
                .join(",");
            sql.push_str(&format!(" AND category_id IN ({placeholders})"));
            for id in &query.category_ids {
                args.push(Box::new(*id));
            }
        }
        if let Some(author_id) = query.author_id {
            sql.push_str(" AND author_id = ?");
            args.push(Box::new(author_id));
        }
        if let Some(language) = &query.language {
            sql.push_str(" AND language = ?");
            args.push(Box::new(language.clone()));
        }
        if query.featured_only {
            sql.push_str(" AND is_featured = 1");
        }
        if let Some(term) = &query.search {
            sql.push_str(" AND (title LIKE ? OR excerpt LIKE ? OR content LIKE ?)");
            let pattern = format!("%{term}%");
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern));
        }

        match query.order {
            NewsOrder::Latest => sql.push_str(" ORDER BY published_at DESC, id DESC"),
            NewsOrder::Popular => sql.push_str(" ORDER BY views_count DESC, id ASC"),
        }

        sql.push_str(" LIMIT ? OFFSET ?");
        args.push(Box::new(query.limit.map(|l| l as i64).unwrap_or(-1)));
        args.push(Box::new(query.offset as i64));

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), map_news)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Effectively-published articles ranked by view events inside the
    /// lookback window
    ///
    /// A per-article subquery over `news_views`, not the lifetime counter,
    /// so the window is always "last `days` days from now". Ties are stable
    /// by id.
    pub fn trending(&self, days: i64, limit: usize) -> Result<Vec<TrendingArticle>> {
        let now = Utc::now();
        let cutoff = now - Duration::days(days);

        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT * FROM (
                SELECT id, title, slug, excerpt, content, language, status, published_at,
                       is_featured, allow_comments, author_id, category_id,
                       featured_image_id, meta_title, meta_description, meta_keywords,
                       views_count, source_url, source_name, created_at, updated_at,
                       (SELECT COUNT(*) FROM news_views v
                        WHERE v.news_id = news.id AND v.viewed_at >= ?1) AS recent_views
                FROM news
                WHERE deleted_at IS NULL
                  AND status = 'published' AND published_at <= ?2
             )
             WHERE recent_views > 0
             ORDER BY recent_views DESC, id ASC
             LIMIT ?3",
        )?;

        let rows = stmt
            .query_map(
                params![to_db_time(cutoff), to_db_time(now), limit as i64],
                |row| {
                    Ok(TrendingArticle {
                        news: map_news(row)?,
                        recent_views: row.get(21)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Recent effectively-published articles from the same category,
    /// excluding the article itself
    pub fn related(&self, id: i64, limit: usize) -> Result<Vec<News>> {
        let news = self.get(id)?;
        let Some(category_id) = news.category_id else {
            return Ok(Vec::new());
        };

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_NEWS}
             WHERE deleted_at IS NULL
               AND id != ?1
               AND category_id = ?2
               AND status = 'published' AND published_at <= ?3
             ORDER BY published_at DESC
             LIMIT ?4"
        ))?;

        let rows = stmt
            .query_map(
                params![id, category_id, to_db_time(Utc::now()), limit as i64],
                map_news,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace the article's tag set
    pub fn set_tags(&self, id: i64, tag_ids: &[i64]) -> Result<()> {
        self.get(id)?;
        let conn = self.db.conn();
        conn.execute("DELETE FROM news_tags WHERE news_id = ?1", params![id])?;
        for tag_id in tag_ids {
            conn.execute(
                "INSERT OR IGNORE INTO news_tags (news_id, tag_id) VALUES (?1, ?2)",
                params![id, tag_id],
            )?;
        }
        Ok(())
    }

    /// Tags attached to an article
    pub fn tags(&self, id: i64) -> Result<Vec<Tag>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT t.id, t.title, t.slug, t.is_active, t.created_at
             FROM tags t
             JOIN news_tags nt ON nt.tag_id = t.id
             WHERE nt.news_id = ?1
             ORDER BY t.title",
        )?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    slug: row.get(2)?,
                    is_active: row.get(3)?,
                    created_at: from_db_time(&row.get::<_, String>(4)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

const SELECT_NEWS: &str = "SELECT id, title, slug, excerpt, content, language, status,
    published_at, is_featured, allow_comments, author_id, category_id,
    featured_image_id, meta_title, meta_description, meta_keywords, views_count,
    source_url, source_name, created_at, updated_at FROM news";

fn map_news(row: &Row<'_>) -> rusqlite::Result<News> {
    let status: String = row.get(6)?;
    let keywords: Option<String> = row.get(15)?;

    Ok(News {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        excerpt: row.get(3)?,
        content: row.get(4)?,
        language: row.get(5)?,
        status: NewsStatus::parse(&status).unwrap_or(NewsStatus::Draft),
        published_at: from_db_time_opt(row.get(7)?),
        is_featured: row.get(8)?,
        allow_comments: row.get(9)?,
        author_id: row.get(10)?,
        category_id: row.get(11)?,
        featured_image_id: row.get(12)?,
        meta_title: row.get(13)?,
        meta_description: row.get(14)?,
        meta_keywords: keywords
            .and_then(|k| serde_json::from_str(&k).ok())
            .unwrap_or_default(),
        views_count: row.get(16)?,
        source_url: row.get(17)?,
        source_name: row.get(18)?,
        created_at: from_db_time(&row.get::<_, String>(19)?),
        updated_at: from_db_time(&row.get::<_, String>(20)?),
    })
}
