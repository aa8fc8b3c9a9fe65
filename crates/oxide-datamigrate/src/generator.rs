//! Migration generation.
//!
//! Ties the pipeline together: snapshots are diffed, planned and rendered in
//! [`MigrationGenerator::plan`], then written and optionally marked as
//! applied in [`MigrationGenerator::emit`].

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::codegen::{Artifact, ArtifactGenerator, RenderStyle};
use crate::diff::diff_excluding;
use crate::error::{MigrateError, Result};
use crate::history::{AppliedRecord, MigrationHistory, DEFAULT_MIGRATION_TABLE};
use crate::naming::{self, NameGuard};
use crate::operations::Operation;
use crate::planner::plan_all;
use crate::snapshot::Snapshot;
use crate::writer::ArtifactSink;

/// Options for the generator.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Base name prefixed to every identifier.
    pub name: String,
    /// Directory receiving the artifacts.
    pub migrations_dir: PathBuf,
    /// Bookkeeping table, never diffed.
    pub migration_table: String,
    /// Whether written artifacts are marked as applied.
    pub mark_applied: bool,
    /// Layout of generated source.
    pub style: RenderStyle,
}

impl GeneratorOptions {
    /// Creates default options for the base name `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            migrations_dir: PathBuf::from("migrations"),
            migration_table: DEFAULT_MIGRATION_TABLE.to_string(),
            mark_applied: true,
            style: RenderStyle::default(),
        }
    }

    /// Sets the migrations directory.
    #[must_use]
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Sets the bookkeeping table name.
    #[must_use]
    pub fn with_migration_table(mut self, table: impl Into<String>) -> Self {
        self.migration_table = table.into();
        self
    }

    /// Disables marking written artifacts as applied.
    #[must_use]
    pub fn without_marking(mut self) -> Self {
        self.mark_applied = false;
        self
    }

    /// Sets the render style.
    #[must_use]
    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }
}

/// Operations and rendered artifacts of one run.
#[derive(Debug, Clone, Default)]
pub struct GenerationPlan {
    /// Planned operations, in ordinal order.
    pub operations: Vec<Operation>,
    /// One artifact per operation.
    pub artifacts: Vec<Artifact>,
}

impl GenerationPlan {
    /// Returns true if no row changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Returns the number of artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }
}

/// Generates data migrations from two snapshots.
#[derive(Debug, Clone)]
pub struct MigrationGenerator {
    options: GeneratorOptions,
    timestamp: Option<NaiveDateTime>,
}

impl MigrationGenerator {
    /// Creates a generator.
    #[must_use]
    pub fn new(options: GeneratorOptions) -> Self {
        Self {
            options,
            timestamp: None,
        }
    }

    /// Uses a fixed timestamp in file names instead of the local time.
    #[must_use]
    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Plans and renders every artifact needed to turn `old` into `new`.
    ///
    /// Nothing is written. Fails if an identifier is invalid or reused, or if
    /// an artifact file already exists.
    pub fn plan(&self, new: &Snapshot, old: &Snapshot) -> Result<GenerationPlan> {
        if self.options.name.is_empty() {
            return Err(MigrateError::InvalidConfig(
                "migration name must not be empty".to_string(),
            ));
        }

        info!(tables = new.tables.len(), "Comparing snapshots");
        let diff = diff_excluding(new, old, &self.options.migration_table);
        let operations = plan_all(&diff);
        if operations.is_empty() {
            return Ok(GenerationPlan::default());
        }

        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Local::now().naive_local());
        let generator = ArtifactGenerator::new(
            self.options.style.clone(),
            &self.options.name,
            timestamp,
            operations.len(),
        );
        let mut guard = NameGuard::scan(&self.options.migrations_dir)?;

        let mut artifacts = Vec::with_capacity(operations.len());
        for (index, op) in operations.iter().enumerate() {
            let table = new.get_table(op.table()).ok_or_else(|| {
                MigrateError::InvalidState(format!("no metadata for table '{}'", op.table()))
            })?;

            let artifact = generator.render(op, table.meta(), index + 1);
            guard.reserve(&artifact.identifier)?;
            naming::reserve_path(&self.options.migrations_dir, &artifact.file_name)?;

            debug!(
                ordinal = artifact.ordinal,
                identifier = %artifact.identifier,
                action = %artifact.action,
                "Planned migration"
            );
            artifacts.push(artifact);
        }

        Ok(GenerationPlan {
            operations,
            artifacts,
        })
    }

    /// Writes the planned artifacts in ordinal order.
    ///
    /// When marking is enabled and `history` is given, each artifact is
    /// recorded as applied right after its file was written. The first
    /// failure stops the run; artifacts already written are kept.
    pub async fn emit<S: ArtifactSink>(
        &self,
        plan: &GenerationPlan,
        sink: &mut S,
        history: Option<&MigrationHistory>,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(plan.artifacts.len());

        for artifact in &plan.artifacts {
            let path = sink.write(artifact)?;

            if self.options.mark_applied {
                if let Some(history) = history {
                    let record = AppliedRecord::new(
                        artifact.version.clone(),
                        &artifact.identifier,
                        Utc::now(),
                    );
                    history.record_applied(&record).await?;
                    info!(version = %artifact.version, "Marked migration as applied");
                }
            }

            written.push(path);
        }

        Ok(written)
    }

    /// Plans and emits in one step.
    pub async fn generate<S: ArtifactSink>(
        &self,
        new: &Snapshot,
        old: &Snapshot,
        sink: &mut S,
        history: Option<&MigrationHistory>,
    ) -> Result<Vec<PathBuf>> {
        let plan = self.plan(new, old)?;
        if plan.is_empty() {
            info!("No new rows detected.");
            return Ok(Vec::new());
        }
        self.emit(&plan, sink, history).await
    }
}
