use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{KeyValueStore, StorageError, entry_size};

use super::SqliteStore;
use super::mapping::{bytes_from_i64, conn, like_prefix, ser};

impl SqliteStore {
    async fn used_bytes_excluding(&self, key: &str) -> Result<usize, StorageError> {
        let row = sqlx::query(
            r"
            SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) AS used
            FROM kv_entries
            WHERE key <> ?1
            ",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;
        let used: i64 = row.try_get("used").map_err(ser)?;
        bytes_from_i64("used", used)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.map(|row| row.try_get::<String, _>("value").map_err(ser))
            .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota_bytes {
            let needed = self.used_bytes_excluding(key).await? + entry_size(key, value);
            if needed > limit {
                return Err(StorageError::QuotaExceeded { needed, limit });
            }
        }

        sqlx::query(
            r"
            INSERT INTO kv_entries (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT key FROM kv_entries
            WHERE key LIKE ?1 ESCAPE '\'
            ORDER BY key
            ",
        )
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(ser))
            // LIKE is case-insensitive for ASCII in SQLite.
            .filter(|key| key.as_ref().map_or(true, |k| k.starts_with(prefix)))
            .collect()
    }
}
