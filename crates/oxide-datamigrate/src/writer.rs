//! Artifact sinks.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::codegen::Artifact;
use crate::error::{MigrateError, Result};

/// Destination of rendered artifacts.
pub trait ArtifactSink {
    /// Persists one artifact and returns where it was written.
    ///
    /// Must fail with [`MigrateError::Collision`] rather than replace an
    /// existing artifact.
    fn write(&mut self, artifact: &Artifact) -> Result<PathBuf>;
}

/// Writes artifacts as files into a migrations directory.
#[derive(Debug, Clone)]
pub struct FsArtifactWriter {
    dir: PathBuf,
}

impl FsArtifactWriter {
    /// Creates a writer for `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for FsArtifactWriter {
    fn write(&mut self, artifact: &Artifact) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&artifact.file_name);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(MigrateError::Collision(path));
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(artifact.body.as_bytes())?;
        file.sync_all()?;

        info!(path = %path.display(), "Generated migration file");
        Ok(path)
    }
}

/// Keeps artifacts in memory. Backs `generate --dry-run`.
#[derive(Debug, Default)]
pub struct MemoryArtifactSink {
    /// Artifacts written so far, in order.
    pub artifacts: Vec<Artifact>,
}

impl ArtifactSink for MemoryArtifactSink {
    fn write(&mut self, artifact: &Artifact) -> Result<PathBuf> {
        if self
            .artifacts
            .iter()
            .any(|a| a.file_name == artifact.file_name)
        {
            return Err(MigrateError::Collision(PathBuf::from(&artifact.file_name)));
        }
        self.artifacts.push(artifact.clone());
        Ok(PathBuf::from(&artifact.file_name))
    }
}
