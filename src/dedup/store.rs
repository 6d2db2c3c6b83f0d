//! Deduplication index of the archiving proxy
//!
//! The proxy remembers every payload digest it has archived together with the
//! date it was seen. Entries only need to live for the retention window; the
//! index is re-derivable, so deletes may run with relaxed durability.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::errors::DedupError;
use crate::config::is_identifier;

/// Durability requested for a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Acknowledged once flushed to stable storage
    Hard,
    /// Acknowledged before reaching stable storage; may be lost on crash
    Soft,
}

/// Range delete over the date-indexed dedup collection
pub trait DedupStore: Send + Sync + 'static {
    /// Create the date index if it does not exist yet
    fn ensure_date_index(&self) -> impl Future<Output = Result<(), DedupError>> + Send;

    /// Delete every entry dated strictly before `cutoff`; returns the count deleted
    fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        durability: Durability,
    ) -> impl Future<Output = Result<u64, DedupError>> + Send;
}

/// Timestamp format stored in the `date` column
#[must_use]
pub fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Dedup index kept in SQLite
#[derive(Debug, Clone)]
pub struct SqliteDedupStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteDedupStore {
    /// Connect to `database_url`, creating the database file if missing
    pub async fn connect(database_url: &str, table: &str) -> Result<Self, DedupError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;
        Self::from_pool(pool, table)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool, table: &str) -> Result<Self, DedupError> {
        if !is_identifier(table) {
            return Err(DedupError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record that a payload digest was archived at `date`
    pub async fn insert(&self, key: &str, url: &str, date: DateTime<Utc>) -> Result<(), DedupError> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {} (key, url, date) VALUES (?1, ?2, ?3)",
            self.table
        ))
        .bind(key)
        .bind(url)
        .bind(format_date(date))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, DedupError> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl DedupStore for SqliteDedupStore {
    async fn ensure_date_index(&self) -> Result<(), DedupError> {
        let table = &self.table;
        // The proxy normally creates the table; creating it here too lets the
        // index exist before the proxy's first write
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                url TEXT,
                date TEXT NOT NULL,
                value TEXT
            )"
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_date ON {table}(julianday(date))"
        ))
        .execute(&self.pool)
        .await?;

        info!(%table, "dedup date index ready");
        Ok(())
    }

    async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        durability: Durability,
    ) -> Result<u64, DedupError> {
        let sql = format!(
            "DELETE FROM {} WHERE julianday(date) < julianday(?1)",
            self.table
        );
        let cutoff = format_date(cutoff);

        let mut conn = self.pool.acquire().await?;
        if durability == Durability::Hard {
            let done = sqlx::query(&sql).bind(&cutoff).execute(&mut *conn).await?;
            return Ok(done.rows_affected());
        }

        let (previous,): (i64,) = sqlx::query_as("PRAGMA synchronous")
            .fetch_one(&mut *conn)
            .await?;
        sqlx::query("PRAGMA synchronous = OFF")
            .execute(&mut *conn)
            .await?;

        let deleted = sqlx::query(&sql).bind(&cutoff).execute(&mut *conn).await;

        // Restore before the connection goes back to the pool
        sqlx::query(&format!("PRAGMA synchronous = {previous}"))
            .execute(&mut *conn)
            .await?;
        debug!(previous, "restored synchronous mode after relaxed delete");

        Ok(deleted?.rows_affected())
    }
}
