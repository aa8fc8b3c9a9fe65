//! Row snapshot types.
//!
//! A [`Snapshot`] is one point-in-time capture of the watched tables: for each
//! table its primary key column, declared column order and the rows keyed by
//! their string-normalized primary key value. Maps preserve insertion order so
//! that diffing and artifact numbering are reproducible.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};
use crate::value::Value;

/// String-normalized primary key value.
pub type RowKey = String;

/// One row: column name to value.
pub type Row = IndexMap<String, Value>;

/// Builds a [`Row`] from `(column, value)` pairs.
#[must_use]
pub fn row<I, K, V>(cells: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    cells
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Table metadata needed to render artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMeta<'a> {
    /// Columns in declaration order.
    pub columns: &'a [String],
    /// Primary key column.
    pub primary_key: &'a str,
}

/// Captured rows of a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Primary key column name.
    pub primary_key: String,
    /// Columns in declaration order.
    pub columns: Vec<String>,
    /// Rows keyed by primary key value.
    #[serde(default)]
    pub rows: IndexMap<RowKey, Row>,
}

impl TableSnapshot {
    /// Creates an empty table snapshot.
    #[must_use]
    pub fn new<I, S>(primary_key: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            primary_key: primary_key.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: IndexMap::new(),
        }
    }

    /// Adds a row keyed by its primary key value.
    ///
    /// A row without a primary key value is keyed by the empty string; use
    /// [`TableSnapshot::keyed_row`] when the key is not part of the row.
    #[must_use]
    pub fn row(mut self, row: Row) -> Self {
        let key = row
            .get(&self.primary_key)
            .and_then(Value::normalized)
            .map(|k| k.into_owned())
            .unwrap_or_default();
        self.rows.insert(key, row);
        self
    }

    /// Adds a row under an explicit key.
    #[must_use]
    pub fn keyed_row(mut self, key: impl Into<RowKey>, row: Row) -> Self {
        self.rows.insert(key.into(), row);
        self
    }

    /// Returns the metadata used for rendering.
    #[must_use]
    pub fn meta(&self) -> TableMeta<'_> {
        TableMeta {
            columns: &self.columns,
            primary_key: &self.primary_key,
        }
    }

    /// Checks the structural invariants of this table.
    ///
    /// The primary key column must be named, and a row that stores its own
    /// primary key value must be keyed by that value.
    pub fn validate(&self, table: &str) -> Result<()> {
        if self.primary_key.is_empty() {
            return Err(MigrateError::InvalidSnapshot(format!(
                "table '{}' has no primary key column",
                table
            )));
        }

        for (key, row) in &self.rows {
            let Some(stored) = row.get(&self.primary_key).and_then(Value::normalized) else {
                continue;
            };
            if stored != key.as_str() {
                return Err(MigrateError::InvalidSnapshot(format!(
                    "row '{}' in table '{}' stores primary key '{}'",
                    key, table, stored
                )));
            }
        }

        Ok(())
    }
}

/// A snapshot of all watched tables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Name of the captured database.
    #[serde(default)]
    pub database: String,
    /// Tables keyed by name, in capture order.
    #[serde(default)]
    pub tables: IndexMap<String, TableSnapshot>,
}

impl Snapshot {
    /// Creates an empty snapshot of the given database.
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: IndexMap::new(),
        }
    }

    /// Adds a table snapshot.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>, table: TableSnapshot) -> Self {
        self.tables.insert(name.into(), table);
        self
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableSnapshot> {
        self.tables.get(name)
    }

    /// Validates every table.
    pub fn validate(&self) -> Result<()> {
        self.tables
            .iter()
            .try_for_each(|(name, table)| table.validate(name))
    }
}
