//! Error types for data migration generation.

use std::path::PathBuf;

/// Errors that can occur while generating data migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A watched table does not exist in the live database.
    ///
    /// The snapshot source recovers from this by skipping the table.
    #[error("Table '{0}' does not exist")]
    UnknownTable(String),

    /// A migration file already exists at the derived path.
    #[error("Migration file already exists: {0}")]
    Collision(PathBuf),

    /// A derived migration identifier is malformed or not unique.
    #[error("Invalid migration identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The offending identifier.
        identifier: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The snapshot file could not be read or parsed.
    #[error("Failed to read snapshot file '{path}': {message}")]
    SnapshotRead {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// The snapshot file could not be written.
    #[error("Failed to write snapshot file '{path}': {message}")]
    SnapshotWrite {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// A snapshot violates one of its structural invariants.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// The table has no usable single-column primary key.
    #[error("Table '{table}' is not supported: {reason}")]
    UnsupportedPrimaryKey {
        /// Table name.
        table: String,
        /// Why the key cannot be used.
        reason: String,
    },

    /// A stored value is not a string, number or NULL.
    #[error("Unsupported value of type {type_name} in {table}.{column}")]
    UnsupportedValue {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Storage type reported by the database.
        type_name: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid bookkeeping state.
    #[error("Invalid migration state: {0}")]
    InvalidState(String),

    /// Database error while reading rows or bookkeeping records.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading/writing migration files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
