use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

use super::schema::Database;

const UPSERT_SQL: &str = r#"
    INSERT INTO kv_store (key, value, updated_at)
    VALUES (?, ?, datetime('now'))
    ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Get the raw JSON text stored under `key`.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Load and deserialize the value stored under `key`.
    ///
    /// # Returns
    ///
    /// `None` if the key has never been written.
    ///
    /// # Errors
    ///
    /// Fails if the stored JSON does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(key).await? {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .with_context(|| format!("Stored value for '{key}' is not valid"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Serialize `value` and store it under `key` (UPSERT).
    ///
    /// The whole document is replaced; there is no partial update.
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(UPSERT_SQL)
            .bind(key)
            .bind(&raw)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Read-modify-write the value under `key` inside one write transaction.
    ///
    /// A missing key starts from `T::default()`. Nothing is written when `f`
    /// returns `None`. Updaters on other handles or in other processes wait on
    /// the database write lock and then see this update.
    pub async fn update_json<T, R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut T) -> Option<R>,
    ) -> Result<Option<R>>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let mut tx = self.pool.begin().await?;

        // Claim the write lock before reading; busy_timeout covers the wait.
        sqlx::query("UPDATE kv_store SET updated_at = updated_at WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let mut value: T = match row {
            Some((raw,)) => serde_json::from_str(&raw)
                .with_context(|| format!("Stored value for '{key}' is not valid"))?,
            None => T::default(),
        };

        let result = f(&mut value);
        if result.is_some() {
            let raw = serde_json::to_string(&value)?;
            sqlx::query(UPSERT_SQL)
                .bind(key)
                .bind(&raw)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(result)
    }

    /// Delete `key`. Returns whether a value was present.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
