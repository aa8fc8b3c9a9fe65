//! Operation planning.
//!
//! Reconciles the raw forward and reverse sets of a [`TableDiff`] into a
//! [`Delta`] and orders the resulting operations: inserts, then deletes,
//! then updates.

use indexmap::IndexMap;
use tracing::warn;

use crate::diff::{cells_match, SnapshotDiff, TableDiff};
use crate::operations::{ColumnDiff, Operation};
use crate::snapshot::{Row, RowKey};
use crate::value::Value;

/// Classified rows of one table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delta {
    /// Table name.
    pub table: String,
    /// Rows only present in the new snapshot.
    pub added: IndexMap<RowKey, Row>,
    /// Rows only present in the old snapshot.
    pub removed: IndexMap<RowKey, Row>,
    /// Rows present on both sides with differing columns.
    pub changed: IndexMap<RowKey, ColumnDiff>,
}

impl Delta {
    /// Returns true if nothing was added, removed or changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Splits a table diff into added, removed and changed rows.
///
/// A key found in both raw sets is a changed row. Its `future` holds the new
/// values of the differing columns and its `past` the old ones.
#[must_use]
pub fn reconcile(diff: &TableDiff) -> Delta {
    let mut delta = Delta {
        table: diff.table.clone(),
        ..Delta::default()
    };

    for (key, new_row) in &diff.forward {
        match diff.reverse.get(key) {
            Some(old_row) => {
                let changes = ColumnDiff {
                    future: narrowed(new_row, old_row, &diff.new_columns, &diff.primary_key),
                    past: narrowed(old_row, new_row, &diff.old_columns, &diff.primary_key),
                };
                delta.changed.insert(key.clone(), changes);
            }
            None => {
                delta.added.insert(key.clone(), new_row.clone());
            }
        }
    }

    for (key, old_row) in &diff.reverse {
        if !diff.forward.contains_key(key) {
            delta.removed.insert(key.clone(), old_row.clone());
        }
    }

    delta
}

/// Columns of `row` whose value differs from `other`, with `row`'s values.
fn narrowed(row: &Row, other: &Row, columns: &[String], primary_key: &str) -> Row {
    columns
        .iter()
        .filter(|column| column.as_str() != primary_key)
        .filter(|column| !cells_match(row, other, column))
        .map(|column| {
            let value = row.get(column).cloned().unwrap_or(Value::Null);
            (column.clone(), value)
        })
        .collect()
}

/// Orders the operations of one delta: inserts, deletes, then updates.
///
/// A changed row with no new value to set is skipped.
#[must_use]
pub fn plan(delta: &Delta) -> Vec<Operation> {
    let mut operations =
        Vec::with_capacity(delta.added.len() + delta.removed.len() + delta.changed.len());

    for (key, row) in &delta.added {
        operations.push(Operation::insert(&delta.table, key, row.clone()));
    }

    for (key, row) in &delta.removed {
        operations.push(Operation::delete(&delta.table, key, row.clone()));
    }

    for (key, changes) in &delta.changed {
        if changes.future.is_empty() {
            warn!(
                table = %delta.table,
                key = %key,
                "Row changed only in columns missing from the new snapshot, skipping update"
            );
            continue;
        }
        operations.push(Operation::update(&delta.table, key, changes.clone()));
    }

    operations
}

/// Plans every table of a snapshot diff, in table order.
#[must_use]
pub fn plan_all(diff: &SnapshotDiff) -> Vec<Operation> {
    diff.tables
        .iter()
        .flat_map(|table| plan(&reconcile(table)))
        .collect()
}
