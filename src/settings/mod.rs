//! Typed key/value settings with a process-wide cache
//!
//! Nearly every component reads settings for configurable behavior
//! (pagination size, moderation policy). Reads go through a whole-table
//! snapshot cached in memory; every write or delete eagerly invalidates the
//! snapshot, so readers may serve at most one stale value between a write
//! and the next read.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::Database;

/// A decoded setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<String>),
}

impl SettingValue {
    /// The stored type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Boolean(_) => "boolean",
            Self::Array(_) => "array",
        }
    }

    /// Encode to the stored TEXT form
    fn encode(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            Self::Array(items) => serde_json::to_string(items).unwrap_or_else(|_| "[]".into()),
        }
    }

    /// Decode from the stored TEXT form according to the type tag
    fn decode(raw: &str, value_type: &str) -> Result<Self> {
        match value_type {
            "string" => Ok(Self::String(raw.to_string())),
            "integer" => Ok(Self::Integer(raw.parse().unwrap_or(0))),
            "float" => Ok(Self::Float(raw.parse().unwrap_or(0.0))),
            "boolean" => Ok(Self::Boolean(matches!(raw, "1" | "true"))),
            "array" => Ok(Self::Array(serde_json::from_str(raw).unwrap_or_default())),
            other => Err(Error::validation(format!(
                "unknown setting type: {other}"
            ))),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A stored setting with its metadata
#[derive(Debug, Clone, Serialize)]
pub struct Setting {
    pub id: i64,
    pub key: String,
    pub value: SettingValue,
    pub description: Option<String>,
    pub group: String,
    pub is_public: bool,
    pub is_autoload: bool,
    pub sort_order: i64,
}

/// Options for [`SettingsStore::set`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingOptions {
    pub description: Option<String>,
    pub group: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_autoload: bool,
    #[serde(default)]
    pub sort_order: i64,
}

/// Settings store with cached whole-table snapshot
#[derive(Clone)]
pub struct SettingsStore {
    db: Arc<Database>,
    cache: Arc<RwLock<Option<HashMap<String, Setting>>>>,
}

impl SettingsStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a decoded value by key
    pub fn get(&self, key: &str) -> Result<Option<SettingValue>> {
        Ok(self.snapshot()?.get(key).map(|s| s.value.clone()))
    }

    /// Boolean setting with default
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key)
            .ok()
            .flatten()
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Integer setting with default
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .ok()
            .flatten()
            .and_then(|v| v.as_i64())
            .unwrap_or(default)
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.snapshot()?.contains_key(key))
    }

    /// Insert or update a setting, invalidating the cache
    pub fn set(&self, key: &str, value: SettingValue, options: SettingOptions) -> Result<Setting> {
        {
            let conn = self.db.conn();
            conn.execute(
                r#"
                INSERT INTO settings (key, value, value_type, description, setting_group,
                                      is_public, is_autoload, sort_order)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    value_type = excluded.value_type,
                    description = excluded.description,
                    setting_group = excluded.setting_group,
                    is_public = excluded.is_public,
                    is_autoload = excluded.is_autoload,
                    sort_order = excluded.sort_order
                "#,
                params![
                    key,
                    value.encode(),
                    value.type_name(),
                    options.description,
                    options.group.unwrap_or_else(|| "general".into()),
                    options.is_public,
                    options.is_autoload,
                    options.sort_order,
                ],
            )?;
        }

        self.invalidate();

        self.find(key)?
            .ok_or_else(|| Error::not_found("setting", key))
    }

    /// Delete a setting, invalidating the cache
    pub fn forget(&self, key: &str) -> Result<bool> {
        let deleted = {
            let conn = self.db.conn();
            conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?
        };

        if deleted > 0 {
            self.invalidate();
        }

        Ok(deleted > 0)
    }

    /// All settings, keyed by setting key
    pub fn all(&self) -> Result<HashMap<String, Setting>> {
        self.snapshot()
    }

    /// Settings in a group
    pub fn get_group(&self, group: &str) -> Result<Vec<Setting>> {
        let mut settings: Vec<Setting> = self
            .snapshot()?
            .into_values()
            .filter(|s| s.group == group)
            .collect();
        settings.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.key.cmp(&b.key)));
        Ok(settings)
    }

    /// Public settings (safe to expose to the frontend)
    pub fn get_public(&self) -> Result<Vec<Setting>> {
        let mut settings: Vec<Setting> = self
            .snapshot()?
            .into_values()
            .filter(|s| s.is_public)
            .collect();
        settings.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(settings)
    }

    /// Drop the cached snapshot; the next read reloads from the table
    pub fn invalidate(&self) {
        *self.cache.write().unwrap() = None;
    }

    /// Seed well-known defaults without overwriting existing keys
    pub fn initialize_defaults(&self) -> Result<()> {
        let defaults: [(&str, SettingValue, SettingOptions); 6] = [
            (
                "site_name",
                SettingValue::String("News Website".into()),
                SettingOptions {
                    description: Some("The name of the website".into()),
                    group: Some("general".into()),
                    is_public: true,
                    is_autoload: true,
                    ..Default::default()
                },
            ),
            (
                "site_description",
                SettingValue::String("Latest news and articles".into()),
                SettingOptions {
                    description: Some("Website description for SEO".into()),
                    group: Some("general".into()),
                    is_public: true,
                    is_autoload: true,
                    ..Default::default()
                },
            ),
            (
                "articles_per_page",
                SettingValue::Integer(12),
                SettingOptions {
                    description: Some("Number of articles per page".into()),
                    group: Some("display".into()),
                    is_public: true,
                    is_autoload: true,
                    ..Default::default()
                },
            ),
            (
                "enable_comments",
                SettingValue::Boolean(true),
                SettingOptions {
                    description: Some("Enable comments on articles".into()),
                    group: Some("features".into()),
                    is_public: true,
                    is_autoload: true,
                    ..Default::default()
                },
            ),
            (
                "moderate_comments",
                SettingValue::Boolean(true),
                SettingOptions {
                    description: Some("Moderate comments before publishing".into()),
                    group: Some("features".into()),
                    is_autoload: true,
                    ..Default::default()
                },
            ),
            (
                "enable_rss",
                SettingValue::Boolean(true),
                SettingOptions {
                    description: Some("Enable RSS feeds".into()),
                    group: Some("features".into()),
                    is_public: true,
                    is_autoload: true,
                    ..Default::default()
                },
            ),
        ];

        for (key, value, options) in defaults {
            if !self.has(key)? {
                self.set(key, value, options)?;
            }
        }

        Ok(())
    }

    fn find(&self, key: &str) -> Result<Option<Setting>> {
        let conn = self.db.conn();
        let row = conn
            .query_row(
                "SELECT id, key, value, value_type, description, setting_group,
                        is_public, is_autoload, sort_order
                 FROM settings WHERE key = ?1",
                params![key],
                Self::map_row,
            )
            .optional()?;

        row.map(Self::decode_row).transpose()
    }

    /// Load the cached snapshot, populating it on first use
    fn snapshot(&self) -> Result<HashMap<String, Setting>> {
        if let Some(cached) = self.cache.read().unwrap().as_ref() {
            return Ok(cached.clone());
        }

        let loaded = self.load_all()?;
        *self.cache.write().unwrap() = Some(loaded.clone());
        Ok(loaded)
    }

    fn load_all(&self) -> Result<HashMap<String, Setting>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, key, value, value_type, description, setting_group,
                    is_public, is_autoload, sort_order
             FROM settings",
        )?;

        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut map = HashMap::with_capacity(rows.len());
        for raw in rows {
            let setting = Self::decode_row(raw)?;
            map.insert(setting.key.clone(), setting);
        }

        Ok(map)
    }

    #[allow(clippy::type_complexity)]
    fn map_row(
        row: &rusqlite::Row<'_>,
    ) -> rusqlite::Result<(i64, String, String, String, Option<String>, String, bool, bool, i64)>
    {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn decode_row(
        raw: (i64, String, String, String, Option<String>, String, bool, bool, i64),
    ) -> Result<Setting> {
        let (id, key, value, value_type, description, group, is_public, is_autoload, sort_order) =
            raw;

        Ok(Setting {
            id,
            key,
            value: SettingValue::decode(&value, &value_type)?,
            description,
            group,
            is_public,
            is_autoload,
            sort_order,
        })
    }
}
