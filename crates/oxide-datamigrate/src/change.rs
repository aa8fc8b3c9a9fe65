//! Concrete row changes carried by generated migrations.
//!
//! A [`RowChange`] is what a generated migration's `up()` and `down()`
//! return. It is a plain description: executing it is left to the runtime
//! that replays the migration.

use crate::operations::Operation;
use crate::snapshot::{Row, TableMeta};
use crate::value::Value;

/// An equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Value the column must equal.
    pub value: Value,
}

/// Insert one row.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertChange {
    /// Target table.
    pub table: String,
    /// Column names, in table order.
    pub columns: Vec<String>,
    /// One value per column.
    pub values: Vec<Value>,
}

impl InsertChange {
    /// Sets the column list.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the values, one per column.
    #[must_use]
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the value inserted into `column`.
    #[must_use]
    pub fn value_of(&self, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.values.get(index)
    }
}

/// Update columns of the filtered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateChange {
    /// Target table.
    pub table: String,
    /// `(column, new value)` assignments, in order.
    pub assignments: Vec<(String, Value)>,
    /// Row filter.
    pub filter: Option<Filter>,
}

impl UpdateChange {
    /// Adds an assignment.
    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    /// Restricts the update to rows where `column = value`.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }
}

/// Delete the filtered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteChange {
    /// Target table.
    pub table: String,
    /// Row filter.
    pub filter: Option<Filter>,
}

impl DeleteChange {
    /// Restricts the delete to rows where `column = value`.
    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter = Some(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }
}

/// A single row change.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    /// Insert one row.
    Insert(InsertChange),
    /// Update rows.
    Update(UpdateChange),
    /// Delete rows.
    Delete(DeleteChange),
}

impl RowChange {
    /// Starts an insert into `table`.
    #[must_use]
    pub fn insert(table: impl Into<String>) -> InsertChange {
        InsertChange {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Starts an update of `table`.
    #[must_use]
    pub fn update(table: impl Into<String>) -> UpdateChange {
        UpdateChange {
            table: table.into(),
            assignments: Vec::new(),
            filter: None,
        }
    }

    /// Starts a delete from `table`.
    #[must_use]
    pub fn delete(table: impl Into<String>) -> DeleteChange {
        DeleteChange {
            table: table.into(),
            filter: None,
        }
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Insert(c) => &c.table,
            Self::Update(c) => &c.table,
            Self::Delete(c) => &c.table,
        }
    }

    /// Builds the concrete change of a planned operation.
    ///
    /// Inserts cover every declared column in order; the primary key column
    /// is taken from the row, or rebuilt from the row key when the row does
    /// not hold it. Updates and deletes filter on the primary key.
    #[must_use]
    pub fn resolve(op: &Operation, meta: TableMeta<'_>) -> Self {
        match op {
            Operation::Insert(op) => {
                let mut columns: Vec<&str> = meta.columns.iter().map(String::as_str).collect();
                if !columns.contains(&meta.primary_key) {
                    columns.insert(0, meta.primary_key);
                }

                let values: Vec<Value> = columns
                    .iter()
                    .map(|&column| {
                        if column == meta.primary_key {
                            key_value(&op.row, meta.primary_key, &op.key)
                        } else {
                            op.row.get(column).cloned().unwrap_or(Value::Null)
                        }
                    })
                    .collect();

                Self::insert(&op.table).columns(columns).values(values).into()
            }
            Operation::Update(op) => {
                let change = op
                    .changes
                    .future
                    .iter()
                    .fold(Self::update(&op.table), |change, (column, value)| {
                        change.set(column, value.clone())
                    });
                change
                    .filter(meta.primary_key, Value::from_key(&op.key))
                    .into()
            }
            Operation::Delete(op) => Self::delete(&op.table)
                .filter(meta.primary_key, key_value(&op.row, meta.primary_key, &op.key))
                .into(),
        }
    }
}

/// The row's own primary key value, or one rebuilt from its key.
fn key_value(row: &Row, primary_key: &str, key: &str) -> Value {
    match row.get(primary_key) {
        Some(value) if !value.is_null() => value.clone(),
        _ => Value::from_key(key),
    }
}

impl From<InsertChange> for RowChange {
    fn from(change: InsertChange) -> Self {
        Self::Insert(change)
    }
}

impl From<UpdateChange> for RowChange {
    fn from(change: UpdateChange) -> Self {
        Self::Update(change)
    }
}

impl From<DeleteChange> for RowChange {
    fn from(change: DeleteChange) -> Self {
        Self::Delete(change)
    }
}
