use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use stress_core::{ResultRecord, ResultSink, Status, StatusFilter};
use tracing::debug;

use crate::error::{Error, Result};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS results (
    target TEXT NOT NULL,
    sent_at TEXT NOT NULL,
    received_at TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    duration_ns INTEGER NOT NULL
)";
const CREATE_STATUS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS results_status_code ON results (status_code)";
const INSERT: &str = "INSERT INTO results (target, sent_at, received_at, status_code, duration_ns) \
     VALUES (?, ?, ?, ?, ?)";
const SELECT_ALL: &str =
    "SELECT target, sent_at, received_at, status_code, duration_ns FROM results ORDER BY rowid";
const SELECT_STATUS_EQ: &str =
    "SELECT target, sent_at, received_at, status_code, duration_ns FROM results \
     WHERE status_code = ? ORDER BY rowid";
const SELECT_STATUS_NE: &str =
    "SELECT target, sent_at, received_at, status_code, duration_ns FROM results \
     WHERE status_code != ? ORDER BY rowid";
const DELETE_ALL: &str = "DELETE FROM results";

/// Result sink backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Private in-memory database. It lives as long as the sink.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // Every connection to `:memory:` is its own database, so keep exactly
        // one connection open for the whole lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// File-backed database, created if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        debug!("Opened result store at {}", path.as_ref().display());
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        sqlx::query(CREATE_STATUS_INDEX).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert(&self, record: &ResultRecord) -> Result<()> {
        let duration_ns = i64::try_from(record.duration.as_nanos()).map_err(|_| {
            Error::InvalidRecord(format!("duration {:?} out of range", record.duration))
        })?;
        sqlx::query(INSERT)
            .bind(&record.target)
            .bind(record.sent_at)
            .bind(record.received_at)
            .bind(record.status.code())
            .bind(duration_ns)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn select(&self, sql: &str, code: Option<i32>) -> Result<Vec<ResultRecord>> {
        let mut query = sqlx::query(sql);
        if let Some(code) = code {
            query = query.bind(code);
        }
        query.fetch_all(&self.pool).await?.iter().map(from_row).collect()
    }
}

fn from_row(row: &SqliteRow) -> Result<ResultRecord> {
    let duration_ns: i64 = row.try_get("duration_ns")?;
    let duration_ns = u64::try_from(duration_ns)
        .map_err(|_| Error::InvalidRecord(format!("negative duration {}", duration_ns)))?;
    Ok(ResultRecord {
        target: row.try_get("target")?,
        sent_at: row.try_get::<DateTime<Utc>, _>("sent_at")?,
        received_at: row.try_get::<DateTime<Utc>, _>("received_at")?,
        status: Status::from_code(row.try_get("status_code")?),
        duration: Duration::from_nanos(duration_ns),
    })
}

#[async_trait]
impl ResultSink for SqliteSink {
    async fn append(&self, record: ResultRecord) -> stress_core::Result<()> {
        Ok(self.insert(&record).await?)
    }

    async fn query_all(&self) -> stress_core::Result<Vec<ResultRecord>> {
        Ok(self.select(SELECT_ALL, None).await?)
    }

    async fn query_by_status(
        &self,
        filter: StatusFilter,
    ) -> stress_core::Result<Vec<ResultRecord>> {
        let (sql, status) = match filter {
            StatusFilter::Equals(status) => (SELECT_STATUS_EQ, status),
            StatusFilter::NotEquals(status) => (SELECT_STATUS_NE, status),
        };
        Ok(self.select(sql, Some(status.code())).await?)
    }

    async fn clear(&self) -> stress_core::Result<()> {
        sqlx::query(DELETE_ALL).execute(&self.pool).await.map_err(Error::from)?;
        Ok(())
    }
}
