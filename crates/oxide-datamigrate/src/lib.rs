//! Row-level data migrations generated from table snapshots.
//!
//! `oxide-datamigrate` compares a fresh capture of some reference tables with
//! a stored baseline and writes one Rust migration file per changed row:
//! - Rows only in the new capture become inserts
//! - Rows only in the baseline become deletes
//! - Rows on both sides with different values become updates carrying just
//!   the changed columns
//!
//! # Architecture
//!
//! - **Snapshot** - Captured rows per table, keyed by primary key
//! - **Diff** - Forward and reverse keyed row sets per table
//! - **Planner** - Reconciles both sets into ordered operations
//! - **Codegen** - Renders each operation into a `DataMigration` impl
//! - **Naming** - Deterministic identifiers, file names and collision checks
//! - **Generator** - Runs the pipeline, writes files, marks them as applied
//!
//! # Generated migrations
//!
//! ```rust,ignore
//! use oxide_datamigrate::prelude::*;
//!
//! pub struct SeedUpdateUsers1;
//!
//! impl DataMigration for SeedUpdateUsers1 {
//!     const VERSION: &'static str = "20240601120000001";
//!     const NAME: &'static str = "SeedUpdateUsers1";
//!
//!     fn up() -> RowChange {
//!         RowChange::update("users")
//!             .set("name", Value::from("B"))
//!             .filter("id", Value::Integer(1))
//!             .into()
//!     }
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Capture the watched tables as the baseline
//! oxide-datamigrate snapshot --table users
//!
//! # Later: write migrations for every row that changed since, then move
//! # the baseline forward
//! oxide-datamigrate generate --name sync --table users --overwrite
//!
//! # Show bookkeeping records
//! oxide-datamigrate show-history
//! ```

pub mod change;
pub mod codegen;
pub mod diff;
pub mod error;
pub mod generator;
pub mod history;
pub mod naming;
pub mod operations;
pub mod planner;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod value;
pub mod writer;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::change::{DeleteChange, Filter, InsertChange, RowChange, UpdateChange};
    pub use crate::codegen::{Artifact, ArtifactGenerator, RenderStyle};
    pub use crate::diff::{diff, diff_excluding, SnapshotDiff, TableDiff};
    pub use crate::error::{MigrateError, Result};
    pub use crate::generator::{GenerationPlan, GeneratorOptions, MigrationGenerator};
    pub use crate::history::{AppliedRecord, MigrationHistory};
    pub use crate::operations::{Action, ColumnDiff, Operation};
    pub use crate::planner::{plan, plan_all, reconcile, Delta};
    pub use crate::snapshot::{row, Row, RowKey, Snapshot, TableMeta, TableSnapshot};
    pub use crate::source::{CollectedSnapshot, SqliteSnapshotSource};
    pub use crate::store::SnapshotStore;
    pub use crate::value::Value;
    pub use crate::writer::{ArtifactSink, FsArtifactWriter, MemoryArtifactSink};
    pub use crate::DataMigration;
}

/// Trait implemented by generated data migrations.
pub trait DataMigration {
    /// Version token, also the file name prefix.
    const VERSION: &'static str;

    /// Display name.
    const NAME: &'static str;

    /// Returns the change applied by this migration.
    fn up() -> change::RowChange;

    /// Returns the change undoing [`DataMigration::up`], if any.
    fn down() -> Option<change::RowChange> {
        None
    }
}
