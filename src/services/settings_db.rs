// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Per-site key/value settings stored as JSON text.

use crate::models::settings::is_private_key;
use crate::services::db::SqliteClient;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

impl SqliteClient {
    /// All settings of the site as one JSON object, optionally without private keys.
    ///
    /// Values that fail to parse are skipped with a warning.
    pub async fn settings_map(&self, include_private: bool) -> Result<Map<String, Value>, sqlx::Error> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM settings WHERE site = ? ORDER BY key")
                .bind(self.site())
                .fetch_all(self.pool())
                .await?;

        let mut map = Map::new();
        for (key, raw) in rows {
            if !include_private && is_private_key(&key) {
                continue;
            }
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    map.insert(key, value);
                }
                Err(e) => tracing::warn!(site = self.site(), key, error = %e, "Unreadable setting"),
            }
        }
        Ok(map)
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<Value>, sqlx::Error> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE site = ? AND key = ?")
                .bind(self.site())
                .bind(key)
                .fetch_optional(self.pool())
                .await?;
        raw.map(|r| serde_json::from_str(&r).map_err(|e| sqlx::Error::Decode(Box::new(e))))
            .transpose()
    }

    /// Fetch a setting and deserialize it into `T`.
    pub async fn get_setting_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, sqlx::Error> {
        self.get_setting(key)
            .await?
            .map(|v| serde_json::from_value(v).map_err(|e| sqlx::Error::Decode(Box::new(e))))
            .transpose()
    }

    pub async fn set_setting(&self, key: &str, value: &Value) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO settings (site, key, value, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (site, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(self.site())
        .bind(key)
        .bind(value.to_string())
        .bind(Utc::now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_setting(&self, key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM settings WHERE site = ? AND key = ?")
            .bind(self.site())
            .bind(key)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Telegram chat for this site: a string or number `telegram_chat_id` setting.
    pub async fn telegram_chat_override(&self) -> Result<Option<String>, sqlx::Error> {
        let value = self
            .get_setting(crate::models::settings::TELEGRAM_CHAT_KEY)
            .await?;
        Ok(match value {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}
