//! Keyed row diffing between two snapshots.
//!
//! For every table of the new snapshot the engine computes two raw sets:
//! `forward` holds the rows of the new side that are absent from or differ
//! on the old side, and `reverse` holds the symmetric set computed from the
//! old side. The [`planner`](crate::planner) reconciles both into operations.

use indexmap::IndexMap;
use tracing::debug;

use crate::snapshot::{Row, RowKey, Snapshot, TableSnapshot};

/// Raw forward and reverse row sets of a single table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDiff {
    /// Table name.
    pub table: String,
    /// Primary key column of the new side.
    pub primary_key: String,
    /// Declared columns of the new side.
    pub new_columns: Vec<String>,
    /// Declared columns of the old side.
    pub old_columns: Vec<String>,
    /// Rows of the new side that are missing or different in the old side.
    pub forward: IndexMap<RowKey, Row>,
    /// Rows of the old side that are missing or different in the new side.
    pub reverse: IndexMap<RowKey, Row>,
}

impl TableDiff {
    /// Returns true if both raw sets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty() && self.reverse.is_empty()
    }
}

/// Per-table diffs, in the table order of the new snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotDiff {
    /// One entry per table of the new snapshot.
    pub tables: Vec<TableDiff>,
}

impl SnapshotDiff {
    /// Returns true if no table has any difference.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(TableDiff::is_empty)
    }

    /// Looks up the diff of a table.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<&TableDiff> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Diffs `new` against `old`.
///
/// Tables are taken from `new`. A table missing from `old` is diffed against
/// an empty table, so all of its rows are forward rows. Tables that only
/// exist in `old` produce no entry.
#[must_use]
pub fn diff(new: &Snapshot, old: &Snapshot) -> SnapshotDiff {
    diff_tables(new, old, None)
}

/// Like [`diff`], but never looks at the `excluded` table.
#[must_use]
pub fn diff_excluding(new: &Snapshot, old: &Snapshot, excluded: &str) -> SnapshotDiff {
    diff_tables(new, old, Some(excluded))
}

fn diff_tables(new: &Snapshot, old: &Snapshot, excluded: Option<&str>) -> SnapshotDiff {
    let mut tables = Vec::with_capacity(new.tables.len());

    for (name, new_table) in &new.tables {
        if excluded == Some(name.as_str()) {
            debug!(table = %name, "Skipping bookkeeping table");
            continue;
        }

        let empty;
        let old_table = match old.get_table(name) {
            Some(table) => table,
            None => {
                empty = TableSnapshot::new(
                    new_table.primary_key.clone(),
                    new_table.columns.iter().cloned(),
                );
                &empty
            }
        };

        tables.push(TableDiff {
            table: name.clone(),
            primary_key: new_table.primary_key.clone(),
            new_columns: new_table.columns.clone(),
            old_columns: old_table.columns.clone(),
            forward: keyed_diff(new_table, old_table),
            reverse: keyed_diff(old_table, new_table),
        });
    }

    for name in old.tables.keys() {
        if !new.tables.contains_key(name) {
            debug!(table = %name, "Table only present in the old snapshot, ignoring");
        }
    }

    SnapshotDiff { tables }
}

/// Returns the rows of `left` that are absent from `right` or differ from
/// their counterpart.
#[must_use]
pub fn keyed_diff(left: &TableSnapshot, right: &TableSnapshot) -> IndexMap<RowKey, Row> {
    let columns = compared_columns(left, right);

    left.rows
        .iter()
        .filter(|(key, row)| match right.rows.get(*key) {
            None => true,
            Some(other) => rows_differ(row, other, &columns),
        })
        .map(|(key, row)| (key.clone(), row.clone()))
        .collect()
}

/// Returns true if any of `columns` holds a different value in `a` and `b`.
///
/// A column missing from a row compares as NULL.
#[must_use]
pub fn rows_differ(a: &Row, b: &Row, columns: &[&str]) -> bool {
    columns.iter().any(|column| !cells_match(a, b, column))
}

pub(crate) fn cells_match(a: &Row, b: &Row, column: &str) -> bool {
    let left = a.get(column).and_then(|v| v.normalized());
    let right = b.get(column).and_then(|v| v.normalized());
    left == right
}

/// Declared columns of both sides, left order first, primary key excluded.
fn compared_columns<'a>(left: &'a TableSnapshot, right: &'a TableSnapshot) -> Vec<&'a str> {
    let mut columns: Vec<&str> = Vec::with_capacity(left.columns.len());
    for column in left.columns.iter().chain(&right.columns) {
        let column = column.as_str();
        if column != left.primary_key && !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::row;
    use crate::value::Value;

    fn users(rows: &[(i64, &str)]) -> Snapshot {
        let table = rows.iter().fold(
            TableSnapshot::new("id", ["id", "name"]),
            |table, (id, name)| {
                table.row(row([("id", Value::from(*id)), ("name", Value::from(*name))]))
            },
        );
        Snapshot::new("app").table("users", table)
    }

    #[test]
    fn identical_snapshots_have_no_diff() {
        let snapshot = users(&[(1, "A"), (2, "B")]);
        let result = diff(&snapshot, &snapshot);
        assert!(result.is_empty());
        assert_eq!(result.tables.len(), 1);
    }

    #[test]
    fn changed_row_is_in_both_directions() {
        let old = users(&[(1, "A")]);
        let new = users(&[(1, "B"), (2, "C")]);
        let result = diff(&new, &old);
        let table = result.get("users").unwrap();

        let forward: Vec<&str> = table.forward.keys().map(String::as_str).collect();
        let reverse: Vec<&str> = table.reverse.keys().map(String::as_str).collect();
        assert_eq!(forward, ["1", "2"]);
        assert_eq!(reverse, ["1"]);
    }

    #[test]
    fn missing_column_compares_as_null() {
        let old = Snapshot::new("app").table(
            "t",
            TableSnapshot::new("id", ["id", "note"]).keyed_row("1", row([("id", 1)])),
        );
        let same = Snapshot::new("app").table(
            "t",
            TableSnapshot::new("id", ["id", "note"])
                .keyed_row("1", row([("id", Value::from(1)), ("note", Value::Null)])),
        );
        assert!(diff(&same, &old).is_empty());

        let filled = Snapshot::new("app").table(
            "t",
            TableSnapshot::new("id", ["id", "note"])
                .keyed_row("1", row([("id", Value::from(1)), ("note", Value::from(""))])),
        );
        assert!(!diff(&filled, &old).is_empty());
    }

    #[test]
    fn numeric_and_text_forms_are_equal() {
        let old = Snapshot::new("app").table(
            "t",
            TableSnapshot::new("id", ["id", "qty"]).row(row([("id", 1), ("qty", 3)])),
        );
        let new = Snapshot::new("app").table(
            "t",
            TableSnapshot::new("id", ["id", "qty"])
                .row(row([("id", Value::from(1)), ("qty", Value::from("3"))])),
        );
        assert!(diff(&new, &old).is_empty());
    }

    #[test]
    fn table_missing_from_old_is_all_forward() {
        let new = users(&[(1, "A"), (2, "B")]);
        let result = diff(&new, &Snapshot::default());
        let table = result.get("users").unwrap();
        assert_eq!(table.forward.len(), 2);
        assert!(table.reverse.is_empty());
    }

    #[test]
    fn table_only_in_old_produces_nothing() {
        let old = users(&[(1, "A")]);
        let result = diff(&Snapshot::default(), &old);
        assert!(result.tables.is_empty());
        assert!(result.is_empty());
    }

    #[test]
    fn excluded_table_is_never_diffed() {
        let new = users(&[(1, "A")]).table(
            "oxide_data_migrations",
            TableSnapshot::new("version", ["version"]).row(row([("version", "1")])),
        );
        let result = diff_excluding(&new, &Snapshot::default(), "oxide_data_migrations");
        assert!(result.get("oxide_data_migrations").is_none());
        assert!(result.get("users").is_some());
    }

    #[test]
    fn key_matching_is_case_sensitive() {
        let old = Snapshot::new("app").table(
            "codes",
            TableSnapshot::new("code", ["code", "label"])
                .row(row([("code", "ab"), ("label", "x")])),
        );
        let new = Snapshot::new("app").table(
            "codes",
            TableSnapshot::new("code", ["code", "label"])
                .row(row([("code", "AB"), ("label", "x")])),
        );
        let result = diff(&new, &old);
        let table = result.get("codes").unwrap();
        assert!(table.forward.contains_key("AB"));
        assert!(table.reverse.contains_key("ab"));
    }
}
