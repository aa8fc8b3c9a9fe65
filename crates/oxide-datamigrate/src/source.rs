//! Live snapshot capture from a SQLite database.

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row as _, TypeInfo, ValueRef};
use tracing::{info, warn};

use crate::error::{MigrateError, Result};
use crate::snapshot::{Row, Snapshot, TableSnapshot};
use crate::value::Value;

/// Result of capturing a set of tables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectedSnapshot {
    /// The captured tables, in request order.
    pub snapshot: Snapshot,
    /// Requested tables that do not exist.
    pub missing: Vec<String>,
}

/// Reads table rows into a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SqliteSnapshotSource {
    pool: SqlitePool,
    database: String,
}

impl SqliteSnapshotSource {
    /// Creates a source over `pool`, labelling snapshots with `database`.
    pub fn new(pool: SqlitePool, database: impl Into<String>) -> Self {
        Self {
            pool,
            database: database.into(),
        }
    }

    /// Captures the requested tables.
    ///
    /// Unknown tables are skipped with a warning and listed in
    /// [`CollectedSnapshot::missing`]. Any other error aborts.
    pub async fn collect(&self, tables: &[String]) -> Result<CollectedSnapshot> {
        let mut collected = CollectedSnapshot {
            snapshot: Snapshot::new(self.database.clone()),
            missing: Vec::new(),
        };

        for name in tables {
            if collected.snapshot.tables.contains_key(name) {
                continue;
            }
            match self.table(name).await {
                Ok(table) => {
                    info!(table = %name, rows = table.rows.len(), "Loaded table");
                    collected.snapshot.tables.insert(name.clone(), table);
                }
                Err(MigrateError::UnknownTable(missing)) => {
                    warn!(table = %missing, "Table does not exist, skipping");
                    collected.missing.push(missing);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(collected)
    }

    /// Lists the user tables of the database.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Captures one table.
    pub async fn table(&self, name: &str) -> Result<TableSnapshot> {
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        if exists.is_none() {
            return Err(MigrateError::UnknownTable(name.to_string()));
        }

        let info: Vec<(String, i64)> =
            sqlx::query_as("SELECT name, pk FROM pragma_table_info(?) ORDER BY cid")
                .bind(name)
                .fetch_all(&self.pool)
                .await?;

        let keys: Vec<&str> = info
            .iter()
            .filter(|(_, pk)| *pk > 0)
            .map(|(column, _)| column.as_str())
            .collect();
        let primary_key = match keys.as_slice() {
            [key] => (*key).to_string(),
            [] => {
                return Err(MigrateError::UnsupportedPrimaryKey {
                    table: name.to_string(),
                    reason: "table has no primary key".to_string(),
                });
            }
            _ => {
                return Err(MigrateError::UnsupportedPrimaryKey {
                    table: name.to_string(),
                    reason: format!("composite primary key ({})", keys.join(", ")),
                });
            }
        };

        let columns: Vec<String> = info.into_iter().map(|(column, _)| column).collect();
        let mut table = TableSnapshot::new(primary_key.clone(), columns.iter().cloned());

        let sql = format!(
            "SELECT * FROM {} ORDER BY {}",
            quote_ident(name),
            quote_ident(&primary_key)
        );
        let rows: Vec<SqliteRow> = sqlx::query(&sql).fetch_all(&self.pool).await?;

        for sqlite_row in &rows {
            let row = decode_row(name, &columns, sqlite_row)?;
            let Some(key) = row.get(&primary_key).and_then(Value::normalized) else {
                warn!(table = %name, "Row with NULL primary key, skipping");
                continue;
            };
            let key = key.into_owned();
            table.rows.insert(key, row);
        }

        Ok(table)
    }
}

fn decode_row(table: &str, columns: &[String], sqlite_row: &SqliteRow) -> Result<Row> {
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| -> Result<(String, Value)> {
            Ok((column.clone(), decode_value(table, column, sqlite_row, index)?))
        })
        .collect()
}

fn decode_value(table: &str, column: &str, row: &SqliteRow, index: usize) -> Result<Value> {
    let (is_null, type_name) = {
        let raw = row.try_get_raw(index)?;
        (raw.is_null(), raw.type_info().name().to_string())
    };
    if is_null {
        return Ok(Value::Null);
    }

    let unsupported = || MigrateError::UnsupportedValue {
        table: table.to_string(),
        column: column.to_string(),
        type_name: type_name.clone(),
    };

    match type_name.as_str() {
        "INTEGER" => Ok(Value::Integer(row.try_get::<i64, _>(index)?)),
        "REAL" => Ok(Value::Float(row.try_get::<f64, _>(index)?)),
        "TEXT" => Ok(Value::Text(row.try_get::<String, _>(index)?)),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            String::from_utf8(bytes).map(Value::Text).map_err(|_| unsupported())
        }
        _ => Err(unsupported()),
    }
}

/// Quotes an SQLite identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
