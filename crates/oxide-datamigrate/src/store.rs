//! Baseline snapshot persistence.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::snapshot::Snapshot;

/// Loads and saves the baseline snapshot as a JSON document.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Creates a store for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the snapshot file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Loads the baseline snapshot.
    ///
    /// A missing file is an empty baseline.
    pub fn load(&self) -> Result<Snapshot> {
        self.check_extension(|path, message| MigrateError::SnapshotRead { path, message })?;

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(
                    path = %self.path.display(),
                    "No snapshot file, starting from an empty baseline"
                );
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| self.read_error(e))?;
        snapshot.validate().map_err(|e| self.read_error(e))?;
        Ok(snapshot)
    }

    /// Saves `snapshot` as the new baseline, creating parent directories.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        self.check_extension(|path, message| MigrateError::SnapshotWrite { path, message })?;

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| self.write_error(e))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
            }
        }
        fs::write(&self.path, json).map_err(|e| self.write_error(e))?;

        info!(path = %self.path.display(), tables = snapshot.tables.len(), "Saved snapshot");
        Ok(())
    }

    fn check_extension(&self, error: impl FnOnce(PathBuf, String) -> MigrateError) -> Result<()> {
        match self.path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(()),
            _ => Err(error(
                self.path.clone(),
                "unsupported snapshot format, expected a .json file".to_string(),
            )),
        }
    }

    fn read_error(&self, e: impl std::fmt::Display) -> MigrateError {
        MigrateError::SnapshotRead {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }

    fn write_error(&self, e: impl std::fmt::Display) -> MigrateError {
        MigrateError::SnapshotWrite {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}
