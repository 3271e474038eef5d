//! Category hierarchy
//!
//! Self-referencing category tree with cycle prevention. Parent links are
//! plain id pointers; ancestor and descendant walks go through repository
//! lookups bounded by [`MAX_TREE_DEPTH`] so corrupted data cannot loop the
//! process.

pub mod tags;

pub use tags::{NewTag, Tag, TagStore};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::{from_db_time, is_unique_violation, to_db_time, Database};
use crate::utils::text::slugify;

/// Upper bound on ancestor/descendant traversal depth
pub const MAX_TREE_DEPTH: usize = 32;

/// A news category
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    pub sort_order: i64,
    pub language: String,
    pub is_active: bool,
    pub meta: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Fields for creating a category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub sort_order: i64,
    pub language: Option<String>,
    pub is_active: Option<bool>,
    pub meta: Option<serde_json::Value>,
}

/// Partial update for a category; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the parent, `Some(Some(id))` re-parents
    pub parent_id: Option<Option<i64>>,
    pub sort_order: Option<i64>,
    pub language: Option<String>,
    pub is_active: Option<bool>,
    pub meta: Option<serde_json::Value>,
}

/// Filters for listing categories
#[derive(Debug, Clone, Default)]
pub struct CategoryFilter {
    pub active_only: bool,
    pub root_only: bool,
    pub language: Option<String>,
    pub search: Option<String>,
}

/// A category with its lifetime published-article count
#[derive(Debug, Clone, Serialize)]
pub struct PopularCategory {
    #[serde(flatten)]
    pub category: Category,
    pub published_news_count: i64,
}

/// Store for category operations
#[derive(Clone)]
pub struct CategoryStore {
    db: Arc<Database>,
}

impl CategoryStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create a category, deriving the slug from the name when absent
    pub fn create(&self, new: NewCategory) -> Result<Category> {
        if new.name.trim().is_empty() {
            return Err(Error::validation("category name must not be empty"));
        }

        // Walking the proposed parent chain validates the parent exists and
        // catches corrupted trees before anything is written.
        if let Some(parent_id) = new.parent_id {
            self.ensure_no_cycle(parent_id, None)?;
        }

        let slug = match new.slug.filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None => slugify(&new.name),
        };

        let now = to_db_time(Utc::now());
        let meta = new
            .meta
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let id = {
            let conn = self.db.conn();
            conn.execute(
                r#"
                INSERT INTO categories (name, slug, description, parent_id, sort_order,
                                        language, is_active, meta, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                "#,
                params![
                    new.name,
                    slug,
                    new.description,
                    new.parent_id,
                    new.sort_order,
                    new.language.unwrap_or_else(|| "en".into()),
                    new.is_active.unwrap_or(true),
                    meta,
                    now,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(format!("category slug already in use: {slug}"))
                } else {
                    e.into()
                }
            })?;
            conn.last_insert_rowid()
        };

        tracing::debug!(category_id = id, slug = %slug, "category created");
        self.get(id)
    }

    /// Update a category
    ///
    /// The circular-reference guard runs only when the parent actually
    /// changes; renaming re-derives the slug only while it is still empty.
    pub fn update(&self, id: i64, update: CategoryUpdate) -> Result<Category> {
        let current = self.get(id)?;

        let parent_id = match update.parent_id {
            Some(new_parent) if new_parent != current.parent_id => {
                if let Some(pid) = new_parent {
                    self.ensure_no_cycle(pid, Some(id))?;
                }
                new_parent
            }
            Some(unchanged) => unchanged,
            None => current.parent_id,
        };

        let name = update.name.unwrap_or(current.name);
        let slug = match update.slug.filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None if current.slug.is_empty() => slugify(&name),
            None => current.slug,
        };

        let meta = match update.meta {
            Some(value) => Some(serde_json::to_string(&value)?),
            None => current
                .meta
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        };

        {
            let conn = self.db.conn();
            conn.execute(
                r#"
                UPDATE categories
                SET name = ?1, slug = ?2, description = ?3, parent_id = ?4,
                    sort_order = ?5, language = ?6, is_active = ?7, meta = ?8,
                    updated_at = ?9
                WHERE id = ?10
                "#,
                params![
                    name,
                    slug,
                    update.description.or(current.description),
                    parent_id,
                    update.sort_order.unwrap_or(current.sort_order),
                    update.language.unwrap_or(current.language),
                    update.is_active.unwrap_or(current.is_active),
                    meta,
                    to_db_time(Utc::now()),
                    id,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::conflict(format!("category slug already in use: {slug}"))
                } else {
                    e.into()
                }
            })?;
        }

        self.get(id)
    }

    /// Delete a category
    ///
    /// Refused while direct children or associated articles exist.
    pub fn delete(&self, id: i64) -> Result<()> {
        self.get(id)?;

        let (children, articles) = {
            let conn = self.db.conn();
            let children: i64 = conn.query_row(
                "SELECT COUNT(*) FROM categories WHERE parent_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            let articles: i64 = conn.query_row(
                "SELECT COUNT(*) FROM news WHERE category_id = ?1 AND deleted_at IS NULL",
                params![id],
                |row| row.get(0),
            )?;
            (children, articles)
        };

        if children > 0 {
            return Err(Error::conflict(
                "cannot delete a category that has subcategories",
            ));
        }
        if articles > 0 {
            return Err(Error::conflict(
                "cannot delete a category that has articles",
            ));
        }

        let conn = self.db.conn();
        conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Get a category by id
    pub fn get(&self, id: i64) -> Result<Category> {
        let conn = self.db.conn();
        conn.query_row(
            &format!("{SELECT_CATEGORY} WHERE id = ?1"),
            params![id],
            map_category,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("category", id))
    }

    /// Get a category by slug
    pub fn get_by_slug(&self, slug: &str) -> Result<Category> {
        let conn = self.db.conn();
        conn.query_row(
            &format!("{SELECT_CATEGORY} WHERE slug = ?1"),
            params![slug],
            map_category,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("category", slug))
    }

    /// List categories ordered by sort_order, then name
    pub fn list(&self, filter: &CategoryFilter) -> Result<Vec<Category>> {
        let mut sql = format!("{SELECT_CATEGORY} WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if filter.active_only {
            sql.push_str(" AND is_active = 1");
        }
        if filter.root_only {
            sql.push_str(" AND parent_id IS NULL");
        }
        if let Some(language) = &filter.language {
            sql.push_str(" AND language = ?");
            args.push(Box::new(language.clone()));
        }
        if let Some(term) = &filter.search {
            sql.push_str(" AND (name LIKE ? OR description LIKE ?)");
            let pattern = format!("%{term}%");
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern));
        }

        sql.push_str(" ORDER BY sort_order, name");

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), map_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Direct children of a category, ordered by sort_order
    pub fn children(&self, id: i64) -> Result<Vec<Category>> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare(&format!("{SELECT_CATEGORY} WHERE parent_id = ?1 ORDER BY sort_order"))?;
        let rows = stmt
            .query_map(params![id], map_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The category's own id plus all descendant ids, depth-first
    ///
    /// Used to scope news queries to "this category and its subcategories".
    pub fn descendant_ids(&self, id: i64) -> Result<Vec<i64>> {
        self.get(id)?;
        let mut ids = Vec::new();
        self.collect_descendants(id, 0, &mut ids)?;
        Ok(ids)
    }

    fn collect_descendants(&self, id: i64, depth: usize, out: &mut Vec<i64>) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::conflict(
                "category tree exceeds maximum depth; hierarchy may be corrupted",
            ));
        }

        out.push(id);

        let child_ids: Vec<i64> = {
            let conn = self.db.conn();
            let mut stmt = conn
                .prepare("SELECT id FROM categories WHERE parent_id = ?1 ORDER BY sort_order")?;
            let rows = stmt
                .query_map(params![id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        for child in child_ids {
            self.collect_descendants(child, depth + 1, out)?;
        }

        Ok(())
    }

    /// The ancestor path for a category, root first, ending at the category
    pub fn breadcrumb(&self, id: i64) -> Result<Vec<Category>> {
        let mut trail = Vec::new();
        let mut current = Some(self.get(id)?);

        while let Some(category) = current {
            let parent_id = category.parent_id;
            trail.push(category);

            if trail.len() > MAX_TREE_DEPTH {
                return Err(Error::conflict(
                    "category tree exceeds maximum depth; hierarchy may be corrupted",
                ));
            }

            current = match parent_id {
                Some(pid) => Some(self.get(pid)?),
                None => None,
            };
        }

        trail.reverse();
        Ok(trail)
    }

    /// Count of effectively-published articles across the category and its
    /// subcategories
    pub fn total_news_count(&self, id: i64, now: DateTime<Utc>) -> Result<i64> {
        let ids = self.descendant_ids(id)?;
        let placeholders: String = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT COUNT(*) FROM news
             WHERE category_id IN ({placeholders})
               AND deleted_at IS NULL
               AND status = 'published' AND published_at <= ?"
        );

        let conn = self.db.conn();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> =
            ids.iter().map(|i| Box::new(*i) as Box<dyn rusqlite::ToSql>).collect();
        args.push(Box::new(to_db_time(now)));
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();

        let count = conn.query_row(&sql, params_ref.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    /// Categories ranked by lifetime count of effectively-published articles
    ///
    /// Deliberately a lifetime count on the category alone, in contrast with
    /// the windowed ranking used for trending articles.
    pub fn popular(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<PopularCategory>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, slug, description, parent_id, sort_order, language,
                    is_active, meta, created_at, updated_at,
                    (SELECT COUNT(*) FROM news n
                     WHERE n.category_id = categories.id
                       AND n.deleted_at IS NULL
                       AND n.status = 'published' AND n.published_at <= ?1)
                        AS published_news_count
             FROM categories
             ORDER BY published_news_count DESC, sort_order, name
             LIMIT ?2",
        )?;

        let rows = stmt
            .query_map(params![to_db_time(now), limit as i64], |row| {
                Ok(PopularCategory {
                    category: map_category(row)?,
                    published_news_count: row.get(11)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Reject the parent assignment when `candidate` (the category being
    /// re-parented) appears anywhere in `parent_id`'s ancestor chain.
    ///
    /// Runs before any write; also guards against corrupted trees via the
    /// depth bound.
    fn ensure_no_cycle(&self, parent_id: i64, candidate: Option<i64>) -> Result<()> {
        if candidate == Some(parent_id) {
            return Err(Error::conflict(
                "category cannot be its own parent: this would create a circular reference",
            ));
        }

        let mut cursor = Some(parent_id);
        let mut depth = 0;

        while let Some(current) = cursor {
            if depth > MAX_TREE_DEPTH {
                return Err(Error::conflict(
                    "category tree exceeds maximum depth; hierarchy may be corrupted",
                ));
            }
            depth += 1;

            if candidate == Some(current) {
                return Err(Error::conflict(
                    "assigning this parent would create a circular reference",
                ));
            }

            cursor = {
                let conn = self.db.conn();
                conn.query_row(
                    "SELECT parent_id FROM categories WHERE id = ?1",
                    params![current],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?
                .ok_or_else(|| Error::not_found("category", current))?
            };
        }

        Ok(())
    }
}

const SELECT_CATEGORY: &str = "SELECT id, name, slug, description, parent_id, sort_order,
    language, is_active, meta, created_at, updated_at FROM categories";

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    let meta: Option<String> = row.get(8)?;
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        parent_id: row.get(4)?,
        sort_order: row.get(5)?,
        language: row.get(6)?,
        is_active: row.get(7)?,
        meta: meta.and_then(|m| serde_json::from_str(&m).ok()),
        created_at: from_db_time(&row.get::<_, String>(9)?),
        updated_at: from_db_time(&row.get::<_, String>(10)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CategoryStore {
        CategoryStore::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn make(store: &CategoryStore, name: &str, parent: Option<i64>) -> Category {
        store
            .create(NewCategory {
                name: name.to_string(),
                parent_id: parent,
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_create_derives_slug() {
        let store = store();
        let category = make(&store, "World News", None);
        assert_eq!(category.slug, "world-news");
        assert!(category.is_root());
    }

    #[test]
    fn test_explicit_slug_kept() {
        let store = store();
        let category = store
            .create(NewCategory {
                name: "World News".to_string(),
                slug: Some("global".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(category.slug, "global");
    }

    #[test]
    fn test_duplicate_slug_conflict() {
        let store = store();
        make(&store, "Tech", None);
        let err = store
            .create(NewCategory {
                name: "Tech".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_self_parent_rejected() {
        let store = store();
        let a = make(&store, "A", None);

        let err = store
            .update(
                a.id,
                CategoryUpdate {
                    parent_id: Some(Some(a.id)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        // Nothing was written
        assert_eq!(store.get(a.id).unwrap().parent_id, None);
    }

    #[test]
    fn test_descendant_parent_rejected() {
        let store = store();
        let a = make(&store, "A", None);
        let b = make(&store, "B", Some(a.id));
        let c = make(&store, "C", Some(b.id));

        // A -> B -> C; re-parenting A under C closes a cycle
        let err = store
            .update(
                a.id,
                CategoryUpdate {
                    parent_id: Some(Some(c.id)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(store.get(a.id).unwrap().parent_id, None);
    }

    #[test]
    fn test_unchanged_parent_skips_guard() {
        let store = store();
        let a = make(&store, "A", None);
        let b = make(&store, "B", Some(a.id));

        // Same parent: no cycle walk, update succeeds
        let updated = store
            .update(
                b.id,
                CategoryUpdate {
                    name: Some("B2".to_string()),
                    parent_id: Some(Some(a.id)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "B2");
        assert_eq!(updated.parent_id, Some(a.id));
    }

    #[test]
    fn test_reparent_to_sibling_tree_allowed() {
        let store = store();
        let a = make(&store, "A", None);
        let b = make(&store, "B", Some(a.id));
        let x = make(&store, "X", None);

        let updated = store
            .update(
                b.id,
                CategoryUpdate {
                    parent_id: Some(Some(x.id)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.parent_id, Some(x.id));
    }

    #[test]
    fn test_descendant_ids_depth_first() {
        let store = store();
        let a = make(&store, "A", None);
        let b = make(&store, "B", Some(a.id));
        let c = make(&store, "C", Some(b.id));
        let d = make(&store, "D", Some(a.id));

        let ids = store.descendant_ids(a.id).unwrap();
        assert_eq!(ids, vec![a.id, b.id, c.id, d.id]);
    }

    #[test]
    fn test_breadcrumb_root_first() {
        let store = store();
        let a = make(&store, "A", None);
        let b = make(&store, "B", Some(a.id));
        let c = make(&store, "C", Some(b.id));

        let trail = store.breadcrumb(c.id).unwrap();
        let names: Vec<&str> = trail.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_delete_guard_children() {
        let store = store();
        let a = make(&store, "A", None);
        let _b = make(&store, "B", Some(a.id));

        let err = store.delete(a.id).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(store.get(a.id).is_ok());
    }

    #[test]
    fn test_delete_leaf_ok() {
        let store = store();
        let a = make(&store, "A", None);
        let b = make(&store, "B", Some(a.id));

        store.delete(b.id).unwrap();
        assert!(matches!(store.get(b.id), Err(Error::NotFound { .. })));
        store.delete(a.id).unwrap();
    }

    #[test]
    fn test_rename_keeps_existing_slug() {
        let store = store();
        let a = make(&store, "Original", None);
        let updated = store
            .update(
                a.id,
                CategoryUpdate {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.slug, "original");
    }

    #[test]
    fn test_list_filters() {
        let store = store();
        let a = make(&store, "Alpha", None);
        let _b = make(&store, "Beta", Some(a.id));
        store
            .update(
                a.id,
                CategoryUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let active = store
            .list(&CategoryFilter {
                active_only: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Beta");

        let roots = store
            .list(&CategoryFilter {
                root_only: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "Alpha");
    }
}
