//! `SQLite` connection pool setup.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const MEMORY_PATH: &str = ":memory:";

/// Open a connection pool for the database at `path`.
///
/// `:memory:` opens a private in-memory database on a single connection, so
/// every query sees the same data. File databases use WAL journaling and
/// have their parent directory created on demand.
///
/// # Errors
/// Returns `DatabaseError::Open` if the path is not valid UTF-8 or the
/// database cannot be opened.
pub async fn connect(path: impl AsRef<Path>) -> Result<Pool<Sqlite>> {
    let path = path.as_ref();
    let path_str = path.to_str().ok_or_else(|| {
        DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
    })?;
    let in_memory = path_str == MEMORY_PATH;

    if !in_memory {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let max_connections = if in_memory { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

    tracing::info!("Database pool created at {}", path_str);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool() {
        let pool = connect(":memory:").await.expect("open in-memory pool");
        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .expect("query in-memory pool");
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let path = tmp.path().join("nested").join("jobs.db");

        let pool = connect(&path).await.expect("open file pool");
        pool.close().await;
        assert!(path.exists());
    }
}
