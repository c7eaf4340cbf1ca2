use anyhow::Result;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, DatabaseError};

// ============================================================================
// Database
// ============================================================================

/// Handle to the local state database.
///
/// All application state lives in a single `kv_store` table holding JSON
/// documents under fixed keys (see [`crate::storage::SCRAPED_CONTENT_KEY`] and
/// friends). Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// `":memory:"` opens a private in-memory database, used by tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// database lock, `DatabaseError::Migration` if the schema could not be
    /// created, and `DatabaseError::Other` for anything else.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let in_memory = path == ":memory:";
        let url = format!("sqlite:{}?mode=rwc", path);

        // Credentials and the API key live in this file: create it user-only.
        #[cfg(unix)]
        if !in_memory {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            let db_path = std::path::Path::new(path);
            if db_path.exists() {
                let perms = std::fs::Permissions::from_mode(0o600);
                if let Err(e) = std::fs::set_permissions(path, perms) {
                    tracing::warn!(path = %path, error = %e, "Failed to set database file permissions");
                }
            } else if db_path.parent().is_some_and(|p| p.exists()) {
                // If creation fails, SQLite reports the error at connect time.
                let _ = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path);
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");

        // A single connection keeps every query on the same in-memory database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;

        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Create the schema. Idempotent; runs inside one transaction.
    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open(":memory:").await.unwrap();
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv_store'",
        )
        .fetch_one(&db.pool)
        .await
        .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        db.migrate().await.unwrap();
    }
}
