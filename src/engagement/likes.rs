//! Idempotent like/dislike toggling
//!
//! At most one reaction row exists per (news, identity). The toggle is a
//! lookup followed by an insert/update/delete, which is not race-free on
//! its own; partial unique indexes on (news_id, user_id) and
//! (news_id, visitor_ip) close the window, and the insert path treats a
//! uniqueness violation as "a concurrent request created the row" and
//! retries as an update. Counts are live row counts, never cached.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{Identity, ReactionKind};
use crate::storage::{is_unique_violation, to_db_time, Database};

/// Outcome of a reaction toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionChange {
    /// No prior reaction existed; one was created
    Created,
    /// The same reaction existed; it was removed (toggle-off)
    Removed,
    /// The opposite reaction existed; it was flipped in place
    Switched,
}

/// Live reaction counts for an article
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReactionCounts {
    pub likes: i64,
    pub dislikes: i64,
}

/// Store for reaction operations
#[derive(Clone)]
pub struct ReactionStore {
    db: Arc<Database>,
}

impl ReactionStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Toggle a reaction for an identity
    ///
    /// - no existing row: create one with the requested kind
    /// - same kind exists: delete it ("undo my like")
    /// - opposite kind exists: flip the row in place, never a second row
    pub fn set_reaction(
        &self,
        news_id: i64,
        kind: ReactionKind,
        identity: &Identity,
    ) -> Result<ReactionChange> {
        self.ensure_news_exists(news_id)?;

        match self.find(news_id, identity)? {
            None => match self.insert(news_id, kind, identity) {
                Ok(()) => Ok(ReactionChange::Created),
                // Concurrent request won the insert; fall through to the
                // update/delete path against the row it created.
                Err(Error::Database(e)) if is_unique_violation(&e) => {
                    self.toggle_existing(news_id, kind, identity)
                }
                Err(e) => Err(e),
            },
            Some(_) => self.toggle_existing(news_id, kind, identity),
        }
    }

    fn toggle_existing(
        &self,
        news_id: i64,
        kind: ReactionKind,
        identity: &Identity,
    ) -> Result<ReactionChange> {
        let existing = self
            .find(news_id, identity)?
            .ok_or_else(|| Error::not_found("reaction", news_id))?;

        let (id, current) = existing;
        if current == kind {
            let conn = self.db.conn();
            conn.execute("DELETE FROM likes WHERE id = ?1", params![id])?;
            Ok(ReactionChange::Removed)
        } else {
            let conn = self.db.conn();
            conn.execute(
                "UPDATE likes SET reaction = ?1 WHERE id = ?2",
                params![kind.as_str(), id],
            )?;
            Ok(ReactionChange::Switched)
        }
    }

    /// The identity's current reaction to an article, if any
    pub fn reaction_of(&self, news_id: i64, identity: &Identity) -> Result<Option<ReactionKind>> {
        Ok(self.find(news_id, identity)?.map(|(_, kind)| kind))
    }

    /// Live like/dislike counts for an article
    pub fn counts(&self, news_id: i64) -> Result<ReactionCounts> {
        let conn = self.db.conn();
        let likes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE news_id = ?1 AND reaction = 'like'",
            params![news_id],
            |row| row.get(0),
        )?;
        let dislikes: i64 = conn.query_row(
            "SELECT COUNT(*) FROM likes WHERE news_id = ?1 AND reaction = 'dislike'",
            params![news_id],
            |row| row.get(0),
        )?;
        Ok(ReactionCounts { likes, dislikes })
    }

    fn insert(&self, news_id: i64, kind: ReactionKind, identity: &Identity) -> Result<()> {
        let (user_id, visitor_ip) = identity.columns();
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO likes (news_id, user_id, visitor_ip, reaction, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![news_id, user_id, visitor_ip, kind.as_str(), to_db_time(Utc::now())],
        )?;
        Ok(())
    }

    fn find(&self, news_id: i64, identity: &Identity) -> Result<Option<(i64, ReactionKind)>> {
        let conn = self.db.conn();
        let row: Option<(i64, String)> = match identity {
            Identity::Registered { user_id } => conn
                .query_row(
                    "SELECT id, reaction FROM likes WHERE news_id = ?1 AND user_id = ?2",
                    params![news_id, user_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?,
            Identity::Anonymous { ip } => conn
                .query_row(
                    "SELECT id, reaction FROM likes
                     WHERE news_id = ?1 AND visitor_ip = ?2 AND user_id IS NULL",
                    params![news_id, ip],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?,
        };

        match row {
            Some((id, raw)) => {
                let kind = ReactionKind::parse(&raw)
                    .ok_or_else(|| Error::validation(format!("unknown reaction type: {raw}")))?;
                Ok(Some((id, kind)))
            }
            None => Ok(None),
        }
    }

    fn ensure_news_exists(&self, news_id: i64) -> Result<()> {
        let conn = self.db.conn();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM news WHERE id = ?1 AND deleted_at IS NULL)",
            params![news_id],
            |row| row.get(0),
        )?;
        if exists {
            Ok(())
        } else {
            Err(Error::not_found("news", news_id))
        }
    }
}
