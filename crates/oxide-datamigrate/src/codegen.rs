//! Migration source generation.
//!
//! Renders one planned [`Operation`] into the Rust source of a unit struct
//! implementing [`DataMigration`](crate::DataMigration).

use chrono::NaiveDateTime;

use crate::change::{Filter, RowChange};
use crate::naming;
use crate::operations::{Action, Operation};
use crate::snapshot::TableMeta;
use crate::value::Value;

/// Header written at the top of every generated file.
pub const GENERATED_HEADER: &str = "// Generated by oxide-datamigrate. Do not edit by hand.";

/// Indentation and line endings of generated source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderStyle {
    /// One indentation level.
    pub indent: String,
    /// Line terminator.
    pub newline: String,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            newline: "\n".to_string(),
        }
    }
}

impl RenderStyle {
    /// Uses `indent` for one indentation level.
    #[must_use]
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Uses `newline` as line terminator.
    #[must_use]
    pub fn with_newline(mut self, newline: impl Into<String>) -> Self {
        self.newline = newline.into();
        self
    }
}

/// A rendered migration file.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    /// Position in the run, starting at 1.
    pub ordinal: usize,
    /// Name of the generated struct.
    pub identifier: String,
    /// Version token, the file name prefix before `_`.
    pub version: String,
    /// File name inside the migrations directory.
    pub file_name: String,
    /// Generated source.
    pub body: String,
    /// Target table.
    pub table: String,
    /// Action of the rendered operation.
    pub action: Action,
}

/// Renders operations into artifacts for one run.
#[derive(Debug, Clone)]
pub struct ArtifactGenerator {
    style: RenderStyle,
    base_name: String,
    timestamp: NaiveDateTime,
    ordinal_width: usize,
}

impl ArtifactGenerator {
    /// Creates a generator for a run of `count` artifacts.
    #[must_use]
    pub fn new(
        style: RenderStyle,
        base_name: impl Into<String>,
        timestamp: NaiveDateTime,
        count: usize,
    ) -> Self {
        Self {
            style,
            base_name: base_name.into(),
            timestamp,
            ordinal_width: naming::ordinal_width(count),
        }
    }

    /// Renders `op` as the artifact at position `ordinal`.
    #[must_use]
    pub fn render(&self, op: &Operation, meta: TableMeta<'_>, ordinal: usize) -> Artifact {
        let identifier = naming::identifier(&self.base_name, op.action(), op.table(), op.key());
        let file_name = naming::file_name(self.timestamp, ordinal, self.ordinal_width, &identifier);
        let version = naming::version(&file_name).to_string();

        let up = RowChange::resolve(op, meta);
        let down = op.reverse().map(|rev| RowChange::resolve(&rev, meta));
        let body = render_source(&self.style, &identifier, &version, &up, down.as_ref());

        Artifact {
            ordinal,
            identifier,
            version,
            file_name,
            body,
            table: op.table().to_string(),
            action: op.action(),
        }
    }
}

/// Renders a complete migration source file.
#[must_use]
pub fn render_source(
    style: &RenderStyle,
    identifier: &str,
    version: &str,
    up: &RowChange,
    down: Option<&RowChange>,
) -> String {
    let mut w = SourceWriter::new(style);

    w.line(0, GENERATED_HEADER);
    w.blank();
    w.line(0, "use oxide_datamigrate::prelude::*;");
    w.blank();
    w.line(0, &format!("pub struct {identifier};"));
    w.blank();
    w.line(0, &format!("impl DataMigration for {identifier} {{"));
    w.line(1, &format!("const VERSION: &'static str = {version:?};"));
    w.line(1, &format!("const NAME: &'static str = {identifier:?};"));
    w.blank();
    w.line(1, "fn up() -> RowChange {");
    w.change(2, up, ".into()");
    w.line(1, "}");

    if let Some(down) = down {
        w.blank();
        w.line(1, "fn down() -> Option<RowChange> {");
        w.line(2, "Some(");
        w.change(3, down, ".into(),");
        w.line(2, ")");
        w.line(1, "}");
    }

    w.line(0, "}");
    w.finish()
}

/// Renders a value as a Rust expression.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "Value::Null".to_string(),
        Value::Integer(i) => format!("Value::Integer({i})"),
        Value::Float(f) if f.is_nan() => "Value::Float(f64::NAN)".to_string(),
        Value::Float(f) if f.is_infinite() && *f > 0.0 => "Value::Float(f64::INFINITY)".to_string(),
        Value::Float(f) if f.is_infinite() => "Value::Float(f64::NEG_INFINITY)".to_string(),
        Value::Float(f) => format!("Value::Float({f:?})"),
        Value::Text(s) => format!("Value::from({s:?})"),
    }
}

struct SourceWriter<'a> {
    style: &'a RenderStyle,
    out: String,
}

impl<'a> SourceWriter<'a> {
    fn new(style: &'a RenderStyle) -> Self {
        Self {
            style,
            out: String::new(),
        }
    }

    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str(&self.style.indent);
        }
        self.out.push_str(text);
        self.out.push_str(&self.style.newline);
    }

    fn blank(&mut self) {
        self.out.push_str(&self.style.newline);
    }

    /// Writes a builder chain, closing it with `last`.
    fn change(&mut self, depth: usize, change: &RowChange, last: &str) {
        match change {
            RowChange::Insert(insert) => {
                self.line(depth, &format!("RowChange::insert({:?})", insert.table));
                let columns: Vec<String> =
                    insert.columns.iter().map(|c| format!("{c:?}")).collect();
                self.line(depth + 1, &format!(".columns([{}])", columns.join(", ")));
                self.line(depth + 1, ".values([");
                for value in &insert.values {
                    self.line(depth + 2, &format!("{},", render_value(value)));
                }
                self.line(depth + 1, "])");
            }
            RowChange::Update(update) => {
                self.line(depth, &format!("RowChange::update({:?})", update.table));
                for (column, value) in &update.assignments {
                    self.line(depth + 1, &format!(".set({column:?}, {})", render_value(value)));
                }
                self.filter(depth + 1, update.filter.as_ref());
            }
            RowChange::Delete(delete) => {
                self.line(depth, &format!("RowChange::delete({:?})", delete.table));
                self.filter(depth + 1, delete.filter.as_ref());
            }
        }
        self.line(depth + 1, last);
    }

    fn filter(&mut self, depth: usize, filter: Option<&Filter>) {
        if let Some(filter) = filter {
            self.line(
                depth,
                &format!(".filter({:?}, {})", filter.column, render_value(&filter.value)),
            );
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::ColumnDiff;
    use crate::snapshot::{row, TableSnapshot};
    use chrono::NaiveDate;

    fn generator(count: usize) -> ArtifactGenerator {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        ArtifactGenerator::new(RenderStyle::default(), "seed", at, count)
    }

    fn users() -> TableSnapshot {
        TableSnapshot::new("id", ["id", "name"])
    }

    #[test]
    fn insert_artifact() {
        let table = users();
        let op = Operation::insert(
            "users",
            "2",
            row([("id", Value::from(2)), ("name", Value::from("C"))]),
        );
        let artifact = generator(1).render(&op, table.meta(), 1);

        assert_eq!(artifact.identifier, "SeedInsertUsers2");
        assert_eq!(artifact.file_name, "20240102030405001_seed_insert_users2.rs");
        assert_eq!(artifact.version, "20240102030405001");
        assert_eq!(artifact.action, Action::Insert);

        let body = &artifact.body;
        assert!(body.starts_with(GENERATED_HEADER));
        assert!(body.contains("pub struct SeedInsertUsers2;"));
        assert!(body.contains("impl DataMigration for SeedInsertUsers2 {"));
        assert!(body.contains("const VERSION: &'static str = \"20240102030405001\";"));
        assert!(body.contains("RowChange::insert(\"users\")"));
        assert!(body.contains(".columns([\"id\", \"name\"])"));
        assert!(body.contains("Value::Integer(2),"));
        assert!(body.contains("Value::from(\"C\"),"));
        // Down migration removes the inserted row.
        assert!(body.contains("RowChange::delete(\"users\")"));
        assert!(body.contains(".filter(\"id\", Value::Integer(2))"));
    }

    #[test]
    fn update_artifact_renders_future_up_and_past_down() {
        let table = users();
        let op = Operation::update(
            "users",
            "1",
            ColumnDiff {
                future: row([("name", "B")]),
                past: row([("name", "A")]),
            },
        );
        let body = generator(1).render(&op, table.meta(), 1).body;

        let up = body.find("fn up()").unwrap();
        let down = body.find("fn down()").unwrap();
        let set_new = body.find(".set(\"name\", Value::from(\"B\"))").unwrap();
        let set_old = body.find(".set(\"name\", Value::from(\"A\"))").unwrap();
        assert!(up < set_new && set_new < down && down < set_old);
    }

    #[test]
    fn delete_artifact_filters_by_primary_key() {
        let table = users();
        let op = Operation::delete(
            "users",
            "5",
            row([("id", Value::from(5)), ("name", Value::from("E"))]),
        );
        let artifact = generator(1).render(&op, table.meta(), 1);

        assert_eq!(artifact.identifier, "SeedDeleteUsers5");
        assert!(artifact.body.contains("RowChange::delete(\"users\")"));
        assert!(artifact.body.contains(".filter(\"id\", Value::Integer(5))"));
        // Down migration restores the removed row.
        assert!(artifact.body.contains("RowChange::insert(\"users\")"));
    }

    #[test]
    fn style_controls_layout() {
        let up: RowChange = RowChange::delete("t").filter("id", 1).into();
        let style = RenderStyle::default().with_indent("\t").with_newline("\r\n");
        let body = render_source(&style, "ADeleteT1", "1", &up, None);

        assert!(body.contains("\r\n\tfn up() -> RowChange {\r\n"));
        assert!(body.contains("\t\tRowChange::delete(\"t\")\r\n"));
        assert!(!body.contains("fn down()"));
    }

    #[test]
    fn values_render_as_rust_literals() {
        assert_eq!(render_value(&Value::Null), "Value::Null");
        assert_eq!(render_value(&Value::Integer(-4)), "Value::Integer(-4)");
        assert_eq!(render_value(&Value::Float(1.0)), "Value::Float(1.0)");
        assert_eq!(render_value(&Value::Float(f64::NAN)), "Value::Float(f64::NAN)");
        assert_eq!(
            render_value(&Value::Float(f64::NEG_INFINITY)),
            "Value::Float(f64::NEG_INFINITY)"
        );
        assert_eq!(
            render_value(&Value::from("say \"hi\"\n")),
            r#"Value::from("say \"hi\"\n")"#
        );
    }

    #[test]
    fn ordinal_width_follows_run_size() {
        let table = users();
        let op = Operation::delete("users", "1", row([("id", 1)]));
        let artifact = generator(1200).render(&op, table.meta(), 42);
        assert!(artifact.file_name.starts_with("202401020304050042_"));
    }
}
