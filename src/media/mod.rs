//! Uploaded-file metadata registry
//!
//! The engine tracks path metadata only; the bytes live with the external
//! file-storage collaborator. The media type is classified from the file
//! extension at registration time, and deletion is refused while the file
//! is referenced as an article's featured image or by an advertisement.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::MediaType;
use crate::storage::{from_db_time, to_db_time, Database};

/// Registered upload metadata
#[derive(Debug, Clone, Serialize)]
pub struct Media {
    pub id: i64,
    pub media_type: MediaType,
    pub title: Option<String>,
    pub original_name: String,
    pub file_name: String,
    pub file_path: String,
    pub disk: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub alt_text: Option<String>,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for registering an upload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMedia {
    pub title: Option<String>,
    pub original_name: String,
    pub file_name: String,
    pub file_path: String,
    pub disk: Option<String>,
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: i64,
    /// Image dimensions; ignored for non-image types
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub alt_text: Option<String>,
    pub is_visible: Option<bool>,
}

/// Filters for listing media
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    pub media_type: Option<MediaType>,
    pub visible_only: bool,
    pub search: Option<String>,
}

/// Store for media operations
#[derive(Clone)]
pub struct MediaStore {
    db: Arc<Database>,
}

impl MediaStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register an upload, classifying its type from the file extension
    pub fn create(&self, new: NewMedia) -> Result<Media> {
        if new.file_name.trim().is_empty() || new.file_path.trim().is_empty() {
            return Err(Error::validation("media file name and path are required"));
        }

        let media_type = MediaType::from_extension(&new.file_name);

        // Dimensions only make sense for images
        let (width, height) = if media_type == MediaType::Image {
            (new.width, new.height)
        } else {
            (None, None)
        };

        let id = {
            let conn = self.db.conn();
            conn.execute(
                r#"
                INSERT INTO media (media_type, title, original_name, file_name, file_path,
                                   disk, mime_type, file_size, width, height, alt_text,
                                   is_visible, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    media_type.as_str(),
                    new.title,
                    new.original_name,
                    new.file_name,
                    new.file_path,
                    new.disk.unwrap_or_else(|| "local".into()),
                    new.mime_type,
                    new.file_size,
                    width,
                    height,
                    new.alt_text,
                    new.is_visible.unwrap_or(true),
                    to_db_time(Utc::now()),
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get(id)
    }

    /// Delete an upload's metadata
    ///
    /// Refused while the file is referenced by an article or advertisement.
    pub fn delete(&self, id: i64) -> Result<()> {
        self.get(id)?;

        let (featured_refs, ad_refs) = {
            let conn = self.db.conn();
            let featured: i64 = conn.query_row(
                "SELECT COUNT(*) FROM news WHERE featured_image_id = ?1 AND deleted_at IS NULL",
                params![id],
                |row| row.get(0),
            )?;
            let ads: i64 = conn.query_row(
                "SELECT COUNT(*) FROM advertisements WHERE media_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            (featured, ads)
        };

        if featured_refs > 0 {
            return Err(Error::conflict(
                "cannot delete media used as a featured image",
            ));
        }
        if ad_refs > 0 {
            return Err(Error::conflict(
                "cannot delete media used by an advertisement",
            ));
        }

        let conn = self.db.conn();
        conn.execute("DELETE FROM media WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Media> {
        let conn = self.db.conn();
        conn.query_row(
            &format!("{SELECT_MEDIA} WHERE id = ?1"),
            params![id],
            map_media,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("media", id))
    }

    pub fn list(&self, filter: &MediaFilter) -> Result<Vec<Media>> {
        let mut sql = format!("{SELECT_MEDIA} WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(media_type) = filter.media_type {
            sql.push_str(" AND media_type = ?");
            args.push(Box::new(media_type.as_str()));
        }
        if filter.visible_only {
            sql.push_str(" AND is_visible = 1");
        }
        if let Some(term) = &filter.search {
            sql.push_str(" AND (title LIKE ? OR original_name LIKE ?)");
            let pattern = format!("%{term}%");
            args.push(Box::new(pattern.clone()));
            args.push(Box::new(pattern));
        }

        sql.push_str(" ORDER BY created_at DESC");

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), map_media)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn set_visibility(&self, id: i64, visible: bool) -> Result<Media> {
        self.get(id)?;
        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE media SET is_visible = ?1 WHERE id = ?2",
                params![visible, id],
            )?;
        }
        self.get(id)
    }
}

const SELECT_MEDIA: &str = "SELECT id, media_type, title, original_name, file_name,
    file_path, disk, mime_type, file_size, width, height, alt_text, is_visible,
    created_at FROM media";

fn map_media(row: &Row<'_>) -> rusqlite::Result<Media> {
    let media_type: String = row.get(1)?;
    Ok(Media {
        id: row.get(0)?,
        media_type: MediaType::parse(&media_type).unwrap_or(MediaType::Document),
        title: row.get(2)?,
        original_name: row.get(3)?,
        file_name: row.get(4)?,
        file_path: row.get(5)?,
        disk: row.get(6)?,
        mime_type: row.get(7)?,
        file_size: row.get(8)?,
        width: row.get(9)?,
        height: row.get(10)?,
        alt_text: row.get(11)?,
        is_visible: row.get(12)?,
        created_at: from_db_time(&row.get::<_, String>(13)?),
    })
}
