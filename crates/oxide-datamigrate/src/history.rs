//! Bookkeeping of applied data migrations.
//!
//! Generated migrations can be marked as already applied on the database
//! they were captured from, so that replaying the migration set there skips
//! them. Records live in a table named by the caller (default
//! [`DEFAULT_MIGRATION_TABLE`]); the name is validated and quoted, every
//! value is a bound parameter.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::{MigrateError, Result};

/// Default name of the bookkeeping table.
pub const DEFAULT_MIGRATION_TABLE: &str = "oxide_data_migrations";

/// Maximum stored length of a migration name.
pub const MAX_NAME_LEN: usize = 100;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRecord {
    /// Version token, the file name prefix.
    pub version: String,
    /// Display name, at most [`MAX_NAME_LEN`] characters.
    pub migration_name: String,
    /// When the migration started.
    pub start_time: DateTime<Utc>,
    /// When the migration finished.
    pub end_time: DateTime<Utc>,
    /// Whether execution should stop after this migration.
    pub breakpoint: bool,
}

impl AppliedRecord {
    /// Creates a record started and finished at `at`.
    ///
    /// The name is truncated to [`MAX_NAME_LEN`] characters.
    #[must_use]
    pub fn new(version: impl Into<String>, migration_name: &str, at: DateTime<Utc>) -> Self {
        Self {
            version: version.into(),
            migration_name: migration_name.chars().take(MAX_NAME_LEN).collect(),
            start_time: at,
            end_time: at,
            breakpoint: false,
        }
    }
}

/// Manages the bookkeeping table.
#[derive(Debug, Clone)]
pub struct MigrationHistory {
    pool: SqlitePool,
    table: String,
}

impl MigrationHistory {
    /// Creates a history manager using [`DEFAULT_MIGRATION_TABLE`].
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            table: DEFAULT_MIGRATION_TABLE.to_string(),
        }
    }

    /// Creates a history manager for a custom table name.
    pub fn with_table(pool: SqlitePool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }

    /// Returns the bookkeeping table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Ensures the bookkeeping table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (
                version TEXT PRIMARY KEY NOT NULL,
                migration_name TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                breakpoint INTEGER NOT NULL DEFAULT 0
            )",
            self.table
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Records a migration as applied.
    pub async fn record_applied(&self, record: &AppliedRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO \"{}\" (version, migration_name, start_time, end_time, breakpoint) \
             VALUES (?, ?, ?, ?, ?)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&record.version)
            .bind(&record.migration_name)
            .bind(record.start_time.format(TIMESTAMP_FORMAT).to_string())
            .bind(record.end_time.format(TIMESTAMP_FORMAT).to_string())
            .bind(i64::from(record.breakpoint))
            .execute(&self.pool)
            .await?;

        debug!(version = %record.version, table = %self.table, "Marked migration as applied");
        Ok(())
    }

    /// Removes a migration record.
    pub async fn record_unapplied(&self, version: &str) -> Result<()> {
        let sql = format!("DELETE FROM \"{}\" WHERE version = ?", self.table);
        let result = sqlx::query(&sql)
            .bind(version)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MigrateError::InvalidState(format!(
                "migration {version} is not recorded as applied"
            )));
        }
        Ok(())
    }

    /// Checks if a migration version has been recorded.
    pub async fn is_applied(&self, version: &str) -> Result<bool> {
        let sql = format!("SELECT 1 FROM \"{}\" WHERE version = ?", self.table);
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Gets all records, ordered by version.
    pub async fn get_applied(&self) -> Result<Vec<AppliedRecord>> {
        let sql = format!(
            "SELECT version, migration_name, start_time, end_time, breakpoint \
             FROM \"{}\" ORDER BY version",
            self.table
        );
        let rows: Vec<(String, String, String, String, i64)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        rows.into_iter()
            .map(|(version, migration_name, start, end, breakpoint)| -> Result<AppliedRecord> {
                Ok(AppliedRecord {
                    version,
                    migration_name,
                    start_time: parse_timestamp(&start)?,
                    end_time: parse_timestamp(&end)?,
                    breakpoint: breakpoint != 0,
                })
            })
            .collect()
    }
}

/// Accepts `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MigrateError::InvalidConfig(format!(
            "invalid migration table name '{name}'"
        )));
    }
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map(|dt| dt.and_utc()))
        .map_err(|e| MigrateError::InvalidState(format!("bad timestamp '{value}': {e}")))
}
