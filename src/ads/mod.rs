//! Advertisement placement and metrics
//!
//! Ads occupy fixed display slots with an optional scheduling window.
//! Displayability is active status plus being inside [starts_at, expires_at]
//! with open bounds unconstrained. Saving an ad whose expiry has passed
//! forces the stored status to `expired` no matter what the caller supplied;
//! the rule holds at write time, not just as a query filter.
//!
//! Impression and click counters use atomic column increments, and the
//! derived click rate is recomputed in one place after every counter change.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{AdPosition, AdStatus, RateType};
use crate::storage::{from_db_time, from_db_time_opt, to_db_time, Database};

/// An advertisement
#[derive(Debug, Clone, Serialize)]
pub struct Advertisement {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub rate: f64,
    pub rate_type: RateType,
    pub media_id: Option<i64>,
    pub html_content: Option<String>,
    pub click_url: Option<String>,
    pub position: AdPosition,
    pub sort_order: i64,
    pub status: AdStatus,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub impressions: i64,
    pub clicks: i64,
    pub click_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Advertisement {
    /// Active status and inside the scheduling window
    pub fn is_displayable(&self, now: DateTime<Utc>) -> bool {
        self.status == AdStatus::Active
            && self.starts_at.map(|at| at <= now).unwrap_or(true)
            && self.expires_at.map(|at| at > now).unwrap_or(true)
    }

    /// Accrued cost under the ad's pricing model
    pub fn cost(&self) -> f64 {
        match self.rate_type {
            RateType::Cpm => (self.impressions as f64 / 1000.0) * self.rate,
            RateType::Cpc => self.clicks as f64 * self.rate,
            RateType::Fixed => self.rate,
        }
    }
}

/// Fields for creating an advertisement
#[derive(Debug, Clone, Deserialize)]
pub struct NewAdvertisement {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub rate: f64,
    pub rate_type: Option<RateType>,
    pub media_id: Option<i64>,
    pub html_content: Option<String>,
    pub click_url: Option<String>,
    pub position: AdPosition,
    #[serde(default)]
    pub sort_order: i64,
    pub status: Option<AdStatus>,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvertisementUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub rate: Option<f64>,
    pub rate_type: Option<RateType>,
    pub media_id: Option<Option<i64>>,
    pub html_content: Option<String>,
    pub click_url: Option<String>,
    pub position: Option<AdPosition>,
    pub sort_order: Option<i64>,
    pub status: Option<AdStatus>,
    pub starts_at: Option<Option<DateTime<Utc>>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Store for advertisement operations
#[derive(Clone)]
pub struct AdStore {
    db: Arc<Database>,
}

impl AdStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create(&self, new: NewAdvertisement) -> Result<Advertisement> {
        if new.title.trim().is_empty() {
            return Err(Error::validation("advertisement title must not be empty"));
        }

        let status = effective_status(
            new.status.unwrap_or(AdStatus::Active),
            new.expires_at,
            Utc::now(),
        );

        let now = to_db_time(Utc::now());
        let id = {
            let conn = self.db.conn();
            conn.execute(
                r#"
                INSERT INTO advertisements (title, description, rate, rate_type, media_id,
                                            html_content, click_url, position, sort_order,
                                            status, starts_at, expires_at, created_at,
                                            updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
                "#,
                params![
                    new.title,
                    new.description,
                    new.rate,
                    new.rate_type.unwrap_or(RateType::Fixed).as_str(),
                    new.media_id,
                    new.html_content,
                    new.click_url,
                    new.position.as_str(),
                    new.sort_order,
                    status.as_str(),
                    new.starts_at.map(to_db_time),
                    new.expires_at.map(to_db_time),
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.get(id)
    }

    pub fn update(&self, id: i64, update: AdvertisementUpdate) -> Result<Advertisement> {
        let current = self.get(id)?;

        let expires_at = match update.expires_at {
            Some(explicit) => explicit,
            None => current.expires_at,
        };
        let status = effective_status(
            update.status.unwrap_or(current.status),
            expires_at,
            Utc::now(),
        );

        {
            let conn = self.db.conn();
            conn.execute(
                r#"
                UPDATE advertisements
                SET title = ?1, description = ?2, rate = ?3, rate_type = ?4, media_id = ?5,
                    html_content = ?6, click_url = ?7, position = ?8, sort_order = ?9,
                    status = ?10, starts_at = ?11, expires_at = ?12, updated_at = ?13
                WHERE id = ?14
                "#,
                params![
                    update.title.unwrap_or(current.title),
                    update.description.or(current.description),
                    update.rate.unwrap_or(current.rate),
                    update.rate_type.unwrap_or(current.rate_type).as_str(),
                    match update.media_id {
                        Some(v) => v,
                        None => current.media_id,
                    },
                    update.html_content.or(current.html_content),
                    update.click_url.or(current.click_url),
                    update.position.unwrap_or(current.position).as_str(),
                    update.sort_order.unwrap_or(current.sort_order),
                    status.as_str(),
                    match update.starts_at {
                        Some(v) => v,
                        None => current.starts_at,
                    }
                    .map(to_db_time),
                    expires_at.map(to_db_time),
                    to_db_time(Utc::now()),
                    id,
                ],
            )?;
        }

        self.get(id)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.get(id)?;
        let conn = self.db.conn();
        conn.execute("DELETE FROM advertisements WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn get(&self, id: i64) -> Result<Advertisement> {
        let conn = self.db.conn();
        conn.query_row(&format!("{SELECT_AD} WHERE id = ?1"), params![id], map_ad)
            .optional()?
            .ok_or_else(|| Error::not_found("advertisement", id))
    }

    /// Displayable ads for a slot, ordered by sort_order then age
    pub fn get_for_position(
        &self,
        position: AdPosition,
        limit: Option<usize>,
    ) -> Result<Vec<Advertisement>> {
        let now = to_db_time(Utc::now());
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_AD}
             WHERE position = ?1
               AND status = 'active'
               AND (starts_at IS NULL OR starts_at <= ?2)
               AND (expires_at IS NULL OR expires_at > ?2)
             ORDER BY sort_order, created_at
             LIMIT ?3"
        ))?;

        let rows = stmt
            .query_map(
                params![
                    position.as_str(),
                    now,
                    limit.map(|l| l as i64).unwrap_or(-1)
                ],
                map_ad,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list(&self, status: Option<AdStatus>) -> Result<Vec<Advertisement>> {
        let mut sql = format!("{SELECT_AD} WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str()));
        }
        sql.push_str(" ORDER BY sort_order, created_at");

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(params_ref.as_slice(), map_ad)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Atomically count an impression and refresh the click rate
    pub fn record_impression(&self, id: i64) -> Result<Advertisement> {
        {
            let conn = self.db.conn();
            let updated = conn.execute(
                "UPDATE advertisements SET impressions = impressions + 1 WHERE id = ?1",
                params![id],
            )?;
            if updated == 0 {
                return Err(Error::not_found("advertisement", id));
            }
        }
        self.refresh_click_rate(id)?;
        self.get(id)
    }

    /// Atomically count a click and refresh the click rate
    pub fn record_click(&self, id: i64) -> Result<Advertisement> {
        {
            let conn = self.db.conn();
            let updated = conn.execute(
                "UPDATE advertisements SET clicks = clicks + 1 WHERE id = ?1",
                params![id],
            )?;
            if updated == 0 {
                return Err(Error::not_found("advertisement", id));
            }
        }
        self.refresh_click_rate(id)?;
        self.get(id)
    }

    /// Clone an ad with counters reset; the copy starts inactive
    pub fn duplicate(&self, id: i64) -> Result<Advertisement> {
        let source = self.get(id)?;
        self.create(NewAdvertisement {
            title: format!("{} (Copy)", source.title),
            description: source.description,
            rate: source.rate,
            rate_type: Some(source.rate_type),
            media_id: source.media_id,
            html_content: source.html_content,
            click_url: source.click_url,
            position: source.position,
            sort_order: source.sort_order,
            status: Some(AdStatus::Inactive),
            starts_at: source.starts_at,
            expires_at: source.expires_at,
        })
    }

    /// Recompute click_rate = clicks / impressions × 100, rounded to two
    /// decimals; skipped while impressions are zero
    ///
    /// The single write path for this derived value.
    fn refresh_click_rate(&self, id: i64) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            "UPDATE advertisements
             SET click_rate = ROUND(clicks * 100.0 / impressions, 2)
             WHERE id = ?1 AND impressions > 0",
            params![id],
        )?;
        Ok(())
    }
}

/// Force `expired` whenever the expiry has passed, regardless of the
/// supplied status
fn effective_status(
    requested: AdStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AdStatus {
    match expires_at {
        Some(at) if at < now => AdStatus::Expired,
        _ => requested,
    }
}

const SELECT_AD: &str = "SELECT id, title, description, rate, rate_type, media_id,
    html_content, click_url, position, sort_order, status, starts_at, expires_at,
    impressions, clicks, click_rate, created_at, updated_at FROM advertisements";

fn map_ad(row: &Row<'_>) -> rusqlite::Result<Advertisement> {
    let rate_type: String = row.get(4)?;
    let position: String = row.get(8)?;
    let status: String = row.get(10)?;

    Ok(Advertisement {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        rate: row.get(3)?,
        rate_type: RateType::parse(&rate_type).unwrap_or(RateType::Fixed),
        media_id: row.get(5)?,
        html_content: row.get(6)?,
        click_url: row.get(7)?,
        position: AdPosition::parse(&position).unwrap_or(AdPosition::Sidebar),
        sort_order: row.get(9)?,
        status: AdStatus::parse(&status).unwrap_or(AdStatus::Inactive),
        starts_at: from_db_time_opt(row.get(11)?),
        expires_at: from_db_time_opt(row.get(12)?),
        impressions: row.get(13)?,
        clicks: row.get(14)?,
        click_rate: row.get(15)?,
        created_at: from_db_time(&row.get::<_, String>(16)?),
        updated_at: from_db_time(&row.get::<_, String>(17)?),
    })
}
