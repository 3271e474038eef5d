//! Threaded comments with a moderation workflow
//!
//! Replies nest through an id-based parent pointer; a reply must belong to
//! the same article as its parent. Each comment carries a denormalized
//! `replies_count` that always equals the number of its *approved* direct
//! children; it is recomputed from source on create, delete and every
//! moderation transition rather than incremented, so it stays correct when
//! statuses change independently.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Actor, CommentAuthor, CommentStatus};
use crate::settings::SettingsStore;
use crate::storage::{from_db_time, to_db_time, Database};
use crate::taxonomy::MAX_TREE_DEPTH;

/// Minutes a non-privileged author may edit their own comment
pub const EDIT_WINDOW_MINUTES: i64 = 15;

/// A comment on an article
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub news_id: i64,
    pub author: CommentAuthor,
    pub ip_address: Option<String>,
    pub parent_id: Option<i64>,
    pub content: String,
    pub status: CommentStatus,
    pub is_pinned: bool,
    pub likes_count: i64,
    pub replies_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Fields for submitting a comment
#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub news_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub author: CommentAuthor,
    pub ip_address: Option<String>,
}

/// Store for comment operations
#[derive(Clone)]
pub struct CommentStore {
    db: Arc<Database>,
    settings: SettingsStore,
}

impl CommentStore {
    pub fn new(db: Arc<Database>, settings: SettingsStore) -> Self {
        Self { db, settings }
    }

    /// Submit a comment
    ///
    /// Refused entirely when the article disallows comments or is not yet
    /// publicly visible. Privileged actors are auto-approved; everyone else
    /// queues as pending unless the `moderate_comments` setting is off.
    pub fn submit(&self, new: NewComment, actor: Option<&Actor>) -> Result<Comment> {
        if new.content.trim().is_empty() {
            return Err(Error::validation("comment content must not be empty"));
        }

        if let CommentAuthor::Guest { name, email } = &new.author {
            if name.trim().is_empty() || email.trim().is_empty() {
                return Err(Error::validation(
                    "guest comments require a name and an email address",
                ));
            }
        }

        let (allow_comments, effectively_published) = self.article_comment_gate(new.news_id)?;
        if !allow_comments {
            return Err(Error::conflict("comments are disabled for this article"));
        }
        if !effectively_published {
            return Err(Error::conflict(
                "comments are only accepted on published articles",
            ));
        }

        if let Some(parent_id) = new.parent_id {
            let parent = self.get(parent_id)?;
            if parent.news_id != new.news_id {
                return Err(Error::validation(
                    "parent comment belongs to a different article",
                ));
            }
        }

        let status = if actor.map(|a| a.is_privileged()).unwrap_or(false) {
            CommentStatus::Approved
        } else if self.settings.get_bool("moderate_comments", true) {
            CommentStatus::Pending
        } else {
            CommentStatus::Approved
        };

        let now = to_db_time(Utc::now());
        let (user_id, guest_name, guest_email) = match &new.author {
            CommentAuthor::Registered { user_id } => (Some(*user_id), None, None),
            CommentAuthor::Guest { name, email } => {
                (None, Some(name.clone()), Some(email.clone()))
            }
        };

        let id = {
            let conn = self.db.conn();
            conn.execute(
                r#"
                INSERT INTO comments (news_id, user_id, guest_name, guest_email, ip_address,
                                      parent_id, content, status, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                "#,
                params![
                    new.news_id,
                    user_id,
                    guest_name,
                    guest_email,
                    new.ip_address,
                    new.parent_id,
                    new.content,
                    status.as_str(),
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };

        if let Some(parent_id) = new.parent_id {
            self.refresh_replies_count(parent_id)?;
        }

        tracing::debug!(comment_id = id, news_id = new.news_id, status = %status, "comment submitted");
        self.get(id)
    }

    /// Edit a comment's content
    ///
    /// Privileged actors may edit any comment; the author only their own,
    /// and only within [`EDIT_WINDOW_MINUTES`] of creation.
    pub fn update_content(&self, id: i64, content: &str, actor: &Actor) -> Result<Comment> {
        if content.trim().is_empty() {
            return Err(Error::validation("comment content must not be empty"));
        }

        let comment = self.get(id)?;
        self.authorize_edit(&comment, actor, true)?;

        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
                params![content, to_db_time(Utc::now()), id],
            )?;
        }

        self.get(id)
    }

    /// Delete a comment and its replies
    pub fn delete(&self, id: i64, actor: &Actor) -> Result<()> {
        let comment = self.get(id)?;
        self.authorize_edit(&comment, actor, false)?;

        // Remove the whole subtree so orphaned replies cannot dangle
        let subtree = self.descendants(id)?;
        {
            let conn = self.db.conn();
            for descendant in subtree.iter().rev() {
                conn.execute("DELETE FROM comments WHERE id = ?1", params![descendant.id])?;
            }
            conn.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        }

        if let Some(parent_id) = comment.parent_id {
            self.refresh_replies_count(parent_id)?;
        }

        Ok(())
    }

    /// Approve a comment
    pub fn approve(&self, id: i64) -> Result<Comment> {
        self.set_status(id, CommentStatus::Approved)
    }

    /// Reject a comment
    pub fn reject(&self, id: i64) -> Result<Comment> {
        self.set_status(id, CommentStatus::Rejected)
    }

    /// Mark a comment as spam
    pub fn mark_spam(&self, id: i64) -> Result<Comment> {
        self.set_status(id, CommentStatus::Spam)
    }

    fn set_status(&self, id: i64, status: CommentStatus) -> Result<Comment> {
        let comment = self.get(id)?;

        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE comments SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), to_db_time(Utc::now()), id],
            )?;
        }

        // Approved-children count may have changed under the parent
        if let Some(parent_id) = comment.parent_id {
            self.refresh_replies_count(parent_id)?;
        }

        self.get(id)
    }

    pub fn pin(&self, id: i64) -> Result<Comment> {
        self.set_pinned(id, true)
    }

    pub fn unpin(&self, id: i64) -> Result<Comment> {
        self.set_pinned(id, false)
    }

    pub fn toggle_pin(&self, id: i64) -> Result<Comment> {
        let comment = self.get(id)?;
        self.set_pinned(id, !comment.is_pinned)
    }

    fn set_pinned(&self, id: i64, pinned: bool) -> Result<Comment> {
        self.get(id)?;
        {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE comments SET is_pinned = ?1, updated_at = ?2 WHERE id = ?3",
                params![pinned, to_db_time(Utc::now()), id],
            )?;
        }
        self.get(id)
    }

    pub fn get(&self, id: i64) -> Result<Comment> {
        let conn = self.db.conn();
        conn.query_row(
            &format!("{SELECT_COMMENT} WHERE id = ?1"),
            params![id],
            map_comment,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("comment", id))
    }

    /// Approved top-level comments for an article, pinned first, oldest first
    pub fn for_news(&self, news_id: i64) -> Result<Vec<Comment>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COMMENT}
             WHERE news_id = ?1 AND parent_id IS NULL AND status = 'approved'
             ORDER BY is_pinned DESC, created_at ASC"
        ))?;
        let rows = stmt
            .query_map(params![news_id], map_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Comments pending moderation, oldest first
    pub fn pending(&self) -> Result<Vec<Comment>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COMMENT} WHERE status = 'pending' ORDER BY created_at ASC"
        ))?;
        let rows = stmt
            .query_map([], map_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Approved direct replies, oldest first
    pub fn replies(&self, id: i64) -> Result<Vec<Comment>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COMMENT}
             WHERE parent_id = ?1 AND status = 'approved'
             ORDER BY created_at ASC"
        ))?;
        let rows = stmt
            .query_map(params![id], map_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The ancestor chain for a comment, root first, ending at the comment
    pub fn thread(&self, id: i64) -> Result<Vec<Comment>> {
        let mut chain = Vec::new();
        let mut current = Some(self.get(id)?);

        while let Some(comment) = current {
            let parent_id = comment.parent_id;
            chain.push(comment);

            if chain.len() > MAX_TREE_DEPTH {
                return Err(Error::conflict(
                    "comment thread exceeds maximum depth; data may be corrupted",
                ));
            }

            current = match parent_id {
                Some(pid) => Some(self.get(pid)?),
                None => None,
            };
        }

        chain.reverse();
        Ok(chain)
    }

    /// The full subtree below a comment, depth-first
    pub fn descendants(&self, id: i64) -> Result<Vec<Comment>> {
        self.get(id)?;
        let mut out = Vec::new();
        self.collect_descendants(id, 0, &mut out)?;
        Ok(out)
    }

    fn collect_descendants(&self, id: i64, depth: usize, out: &mut Vec<Comment>) -> Result<()> {
        if depth > MAX_TREE_DEPTH {
            return Err(Error::conflict(
                "comment thread exceeds maximum depth; data may be corrupted",
            ));
        }

        let children: Vec<Comment> = {
            let conn = self.db.conn();
            let mut stmt = conn.prepare(&format!(
                "{SELECT_COMMENT} WHERE parent_id = ?1 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map(params![id], map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        for child in children {
            let child_id = child.id;
            out.push(child);
            self.collect_descendants(child_id, depth + 1, out)?;
        }

        Ok(())
    }

    /// Count of approved comments on an article
    pub fn approved_count(&self, news_id: i64) -> Result<i64> {
        let conn = self.db.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE news_id = ?1 AND status = 'approved'",
            params![news_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Recompute a comment's replies_count from its approved direct children
    ///
    /// The single write path for this counter.
    fn refresh_replies_count(&self, id: i64) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            "UPDATE comments
             SET replies_count = (SELECT COUNT(*) FROM comments c
                                  WHERE c.parent_id = ?1 AND c.status = 'approved')
             WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    fn authorize_edit(&self, comment: &Comment, actor: &Actor, enforce_window: bool) -> Result<()> {
        if actor.is_privileged() {
            return Ok(());
        }

        if comment.author.user_id() != Some(actor.user_id) {
            return Err(Error::forbidden("you may only modify your own comments"));
        }

        if enforce_window {
            let elapsed = Utc::now() - comment.created_at;
            if elapsed > Duration::minutes(EDIT_WINDOW_MINUTES) {
                return Err(Error::forbidden(format!(
                    "comments can only be edited within {EDIT_WINDOW_MINUTES} minutes of posting"
                )));
            }
        }

        Ok(())
    }

    fn article_comment_gate(&self, news_id: i64) -> Result<(bool, bool)> {
        let conn = self.db.conn();
        let row: Option<(bool, String, Option<String>)> = conn
            .query_row(
                "SELECT allow_comments, status, published_at FROM news
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![news_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (allow_comments, status, published_at) =
            row.ok_or_else(|| Error::not_found("news", news_id))?;

        let now = to_db_time(Utc::now());
        let effectively_published =
            status == "published" && published_at.map(|at| at <= now).unwrap_or(false);

        Ok((allow_comments, effectively_published))
    }
}

const SELECT_COMMENT: &str = "SELECT id, news_id, user_id, guest_name, guest_email,
    ip_address, parent_id, content, status, is_pinned, likes_count, replies_count,
    created_at, updated_at FROM comments";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    let user_id: Option<i64> = row.get(2)?;
    let guest_name: Option<String> = row.get(3)?;
    let guest_email: Option<String> = row.get(4)?;
    let status: String = row.get(8)?;

    let author = match user_id {
        Some(user_id) => CommentAuthor::Registered { user_id },
        None => CommentAuthor::Guest {
            name: guest_name.unwrap_or_default(),
            email: guest_email.unwrap_or_default(),
        },
    };

    Ok(Comment {
        id: row.get(0)?,
        news_id: row.get(1)?,
        author,
        ip_address: row.get(5)?,
        parent_id: row.get(6)?,
        content: row.get(7)?,
        status: CommentStatus::parse(&status).unwrap_or(CommentStatus::Pending),
        is_pinned: row.get(9)?,
        likes_count: row.get(10)?,
        replies_count: row.get(11)?,
        created_at: from_db_time(&row.get::<_, String>(12)?),
        updated_at: from_db_time(&row.get::<_, String>(13)?),
    })
}
