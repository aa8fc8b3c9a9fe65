//! Row operations.
//!
//! Every planned change to a table is exactly one of insert, update or
//! delete. One operation becomes one migration artifact.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::{Row, RowKey};

/// The kind of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Row exists only in the new snapshot.
    Insert,
    /// Row exists on both sides with different values.
    Update,
    /// Row exists only in the old snapshot.
    Delete,
}

impl Action {
    /// Returns the lowercase action name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Returns the capitalized action name used in identifiers.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changed columns of a persisted row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnDiff {
    /// New values of the columns that differ.
    pub future: Row,
    /// Old values of the columns that differ.
    pub past: Row,
}

impl ColumnDiff {
    /// Returns true if no column differs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.future.is_empty() && self.past.is_empty()
    }

    /// Swaps `future` and `past`.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            future: self.past.clone(),
            past: self.future.clone(),
        }
    }
}

/// Insert a full row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRowOp {
    /// Table name.
    pub table: String,
    /// Primary key of the new row.
    pub key: RowKey,
    /// Column values of the new row.
    pub row: Row,
}

/// Update the differing columns of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRowOp {
    /// Table name.
    pub table: String,
    /// Primary key of the updated row.
    pub key: RowKey,
    /// Old and new values of the changed columns.
    pub changes: ColumnDiff,
}

/// Delete a row by primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRowOp {
    /// Table name.
    pub table: String,
    /// Primary key of the removed row.
    pub key: RowKey,
    /// The removed row, kept for reversal.
    pub row: Row,
}

/// A single planned row operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert a row.
    Insert(InsertRowOp),
    /// Update a row.
    Update(UpdateRowOp),
    /// Delete a row.
    Delete(DeleteRowOp),
}

impl Operation {
    /// Creates an insert operation.
    #[must_use]
    pub fn insert(table: impl Into<String>, key: impl Into<RowKey>, row: Row) -> Self {
        Self::Insert(InsertRowOp {
            table: table.into(),
            key: key.into(),
            row,
        })
    }

    /// Creates an update operation.
    #[must_use]
    pub fn update(table: impl Into<String>, key: impl Into<RowKey>, changes: ColumnDiff) -> Self {
        Self::Update(UpdateRowOp {
            table: table.into(),
            key: key.into(),
            changes,
        })
    }

    /// Creates a delete operation.
    #[must_use]
    pub fn delete(table: impl Into<String>, key: impl Into<RowKey>, row: Row) -> Self {
        Self::Delete(DeleteRowOp {
            table: table.into(),
            key: key.into(),
            row,
        })
    }

    /// Returns the action of this operation.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Insert(_) => Action::Insert,
            Self::Update(_) => Action::Update,
            Self::Delete(_) => Action::Delete,
        }
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Insert(op) => &op.table,
            Self::Update(op) => &op.table,
            Self::Delete(op) => &op.table,
        }
    }

    /// Returns the primary key of the target row.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Insert(op) => &op.key,
            Self::Update(op) => &op.key,
            Self::Delete(op) => &op.key,
        }
    }

    /// Returns the operation that undoes this one.
    ///
    /// Updates swap their old and new values; inserts and deletes invert
    /// each other. A delete whose row was not captured cannot be reversed.
    #[must_use]
    pub fn reverse(&self) -> Option<Self> {
        match self {
            Self::Insert(op) => Some(Self::delete(&op.table, &op.key, op.row.clone())),
            Self::Update(op) => Some(Self::update(&op.table, &op.key, op.changes.inverted())),
            Self::Delete(op) if op.row.is_empty() => None,
            Self::Delete(op) => Some(Self::insert(&op.table, &op.key, op.row.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::row;

    #[test]
    fn action_names() {
        assert_eq!(Action::Insert.as_str(), "insert");
        assert_eq!(Action::Update.title(), "Update");
        assert_eq!(Action::Delete.to_string(), "delete");
    }

    #[test]
    fn accessors() {
        let op = Operation::delete("users", "3", row([("id", 3)]));
        assert_eq!(op.action(), Action::Delete);
        assert_eq!(op.table(), "users");
        assert_eq!(op.key(), "3");
    }

    #[test]
    fn reverse_update_swaps_values() {
        let op = Operation::update(
            "users",
            "1",
            ColumnDiff {
                future: row([("name", "B")]),
                past: row([("name", "A")]),
            },
        );
        match op.reverse() {
            Some(Operation::Update(rev)) => {
                assert_eq!(rev.changes.future, row([("name", "A")]));
                assert_eq!(rev.changes.past, row([("name", "B")]));
            }
            other => panic!("Expected Update, got {other:?}"),
        }
    }

    #[test]
    fn reverse_insert_and_delete() {
        let insert = Operation::insert("t", "1", row([("id", 1)]));
        assert!(matches!(insert.reverse(), Some(Operation::Delete(_))));

        let delete = Operation::delete("t", "1", row([("id", 1)]));
        assert!(matches!(delete.reverse(), Some(Operation::Insert(_))));

        let bare = Operation::delete("t", "1", Row::new());
        assert!(bare.reverse().is_none());
    }
}
