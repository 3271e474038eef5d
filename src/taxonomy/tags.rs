//! Flat tag list with many-to-many article associations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::{from_db_time, is_unique_violation, to_db_time, Database};
use crate::utils::text::slugify;

/// A content tag
#[derive(Debug, Clone, Serialize)]
pub struct Tag {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a tag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTag {
    pub title: String,
    pub slug: Option<String>,
    pub is_active: Option<bool>,
}

/// Store for tag operations
#[derive(Clone)]
pub struct TagStore {
    db: Arc<Database>,
}

impl TagStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, new: NewTag) -> Result<Tag> {
        if new.title.trim().is_empty() {
            return Err(Error::validation("tag title must not be empty"));
        }

        let slug = match new.slug.filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None => slugify(&new.title),
        };

        let id = {
            let conn = self.db.conn();
            conn.execute(
                "INSERT INTO tags (title, slug, is_active, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    new.title,
                    slug,
                    new.is_active.unwrap_or(true),
                    to_db_time(Utc::now())
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(format!("tag slug already in use: {slug}"))
                } else {
                    e.into()
                }
            })?;
            conn.last_insert_rowid()
        };

        self.get(id)
    }

    pub fn rename(&self, id: i64, title: &str) -> Result<Tag> {
        self.get(id)?;
        let conn = self.db.conn();
        conn.execute(
            "UPDATE tags SET title = ?1 WHERE id = ?2",
            params![title, id],
        )?;
        drop(conn);
        self.get(id)
    }

    pub fn set_active(&self, id: i64, active: bool) -> Result<Tag> {
        self.get(id)?;
        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE tags SET is_active = ?1 WHERE id = ?2",
                params![active, id],
            )?;
        }
        self.get(id)
    }

    /// Delete a tag; refused while any article still carries it
    pub fn delete(&self, id: i64) -> Result<()> {
        self.get(id)?;

        let attached: i64 = {
            let conn = self.db.conn();
            conn.query_row(
                "SELECT COUNT(*) FROM news_tags WHERE tag_id = ?1",
                params![id],
                |row| row.get(0),
            )?
        };

        if attached > 0 {
            return Err(Error::conflict("cannot delete a tag that has articles"));
        }

        let conn = self.db.conn();
        conn.execute("DELETE FROM tags WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Tag> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, title, slug, is_active, created_at FROM tags WHERE id = ?1",
            params![id],
            map_tag,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("tag", id))
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<Tag> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, title, slug, is_active, created_at FROM tags WHERE slug = ?1",
            params![slug],
            map_tag,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("tag", slug))
    }

    pub fn list(&self, active_only: bool) -> Result<Vec<Tag>> {
        let sql = if active_only {
            "SELECT id, title, slug, is_active, created_at FROM tags WHERE is_active = 1 ORDER BY title"
        } else {
            "SELECT id, title, slug, is_active, created_at FROM tags ORDER BY title"
        };

        let conn = self.db.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], map_tag)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn map_tag(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        is_active: row.get(3)?,
        created_at: from_db_time(&row.get::<_, String>(4)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Arc<Database>, TagStore) {
        let db = Arc::new(Database::in_memory().unwrap());
        (db.clone(), TagStore::new(db))
    }

    #[test]
    fn test_create_derives_slug() {
        let (_db, tags) = store();
        let tag = tags
            .create(NewTag {
                title: "Climate Change".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(tag.slug, "climate-change");
        assert!(tag.is_active);
    }

    #[test]
    fn test_duplicate_slug_conflict() {
        let (_db, tags) = store();
        tags.create(NewTag {
            title: "Economy".to_string(),
            ..Default::default()
        })
        .unwrap();

        let err = tags
            .create(NewTag {
                title: "Economy".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_delete_guard_when_attached() {
        let (db, tags) = store();
        let tag = tags
            .create(NewTag {
                title: "Elections".to_string(),
                ..Default::default()
            })
            .unwrap();

        {
            let conn = db.conn();
            conn.execute(
                "INSERT INTO news (id, title, slug, author_id, created_at, updated_at)
                 VALUES (1, 'a', 'a', 1, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO news_tags (news_id, tag_id) VALUES (1, ?1)",
                params![tag.id],
            )
            .unwrap();
        }

        let err = tags.delete(tag.id).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        {
            let conn = db.conn();
            conn.execute("DELETE FROM news_tags WHERE tag_id = ?1", params![tag.id])
                .unwrap();
        }
        tags.delete(tag.id).unwrap();
    }
}
