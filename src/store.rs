//! SQLite-backed storage for short textual reports

use crate::error::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredReport {
    pub id: i64,
    pub ts: String,
    pub summary: String,
}

/// Handle to the `reports` table. Cheap to clone; open once at startup and
/// close at shutdown.
#[derive(Clone)]
pub struct ReportStore {
    pool: SqlitePool,
}

impl ReportStore {
    /// Open (creating if missing) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        info!("Opened report store at {}", path.as_ref().display());
        Self::init(pool).await
    }

    /// Private in-memory database, used by tests and dry runs
    pub async fn open_in_memory() -> Result<Self> {
        // Each in-memory connection is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                summary TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Store a summary stamped with the current UTC time
    pub async fn insert(&self, summary: &str) -> Result<StoredReport> {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        let result = sqlx::query("INSERT INTO reports (ts, summary) VALUES (?, ?)")
            .bind(&ts)
            .bind(summary)
            .execute(&self.pool)
            .await?;

        Ok(StoredReport {
            id: result.last_insert_rowid(),
            ts,
            summary: summary.to_string(),
        })
    }

    pub async fn latest(&self) -> Result<Option<StoredReport>> {
        let row = sqlx::query_as::<_, StoredReport>(
            "SELECT id, ts, summary FROM reports ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Report store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_latest_on_empty_store() {
        let store = ReportStore::open_in_memory().await.unwrap();
        assert_eq!(store.latest().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_then_latest() {
        let store = ReportStore::open_in_memory().await.unwrap();
        let first = store.insert("one person at the gate").await.unwrap();
        let second = store.insert("gate empty").await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(store.latest().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_handles() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("reports.db");

        let store = ReportStore::open(&path).await.unwrap();
        store.insert("persisted").await.unwrap();
        store.close().await;

        let reopened = ReportStore::open(&path).await.unwrap();
        assert_eq!(reopened.latest().await.unwrap().unwrap().summary, "persisted");
        reopened.close().await;
    }
}
