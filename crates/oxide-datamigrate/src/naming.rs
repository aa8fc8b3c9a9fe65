//! Artifact naming and collision guard.
//!
//! Identifiers have the shape `<Base><Action><Table><Key>`, for example
//! `SeedUsersUpdateUsers1`. File names are
//! `<YYYYmmddHHMMSS><ordinal>_<snake_case identifier>.rs`, with the ordinal
//! zero-padded so that file names sort in ordinal order.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{MigrateError, Result};
use crate::operations::Action;

/// File extension of generated artifacts.
pub const ARTIFACT_EXTENSION: &str = "rs";

/// Minimum width of the zero-padded ordinal.
pub const MIN_ORDINAL_WIDTH: usize = 3;

/// Converts a user-supplied base name like `seed_users` into `SeedUsers`.
#[must_use]
pub fn class_name(base: &str) -> String {
    base.split('_').map(capitalize).collect()
}

/// Converts a table name like `user_roles` into `UserRoles`.
///
/// Characters other than ASCII letters, digits and `_` are dropped.
#[must_use]
pub fn table_name(table: &str) -> String {
    let cleaned: String = table
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase();
    class_name(&cleaned)
}

/// Keeps only the ASCII letters and digits of a row key.
#[must_use]
pub fn key_fragment(key: &str) -> String {
    key.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Builds the identifier of one artifact.
#[must_use]
pub fn identifier(base: &str, action: Action, table: &str, key: &str) -> String {
    format!(
        "{}{}{}{}",
        class_name(base),
        action.title(),
        table_name(table),
        key_fragment(key)
    )
}

/// Checks that `identifier` is a valid type name.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    let invalid = |reason: &str| MigrateError::InvalidIdentifier {
        identifier: identifier.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = identifier.chars().next() else {
        return Err(invalid("identifier is empty"));
    };
    if !first.is_ascii_uppercase() {
        return Err(invalid("must start with an uppercase ASCII letter"));
    }
    if !identifier.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("must only contain ASCII letters and digits"));
    }
    Ok(())
}

/// Converts `SeedInsertUsers1` into `seed_insert_users1`.
#[must_use]
pub fn snake_case(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len() + 8);
    for (i, ch) in identifier.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Width of the zero-padded ordinal for a run of `count` artifacts.
#[must_use]
pub fn ordinal_width(count: usize) -> usize {
    count.to_string().len().max(MIN_ORDINAL_WIDTH)
}

/// Builds the file name of one artifact.
#[must_use]
pub fn file_name(
    timestamp: NaiveDateTime,
    ordinal: usize,
    width: usize,
    identifier: &str,
) -> String {
    format!(
        "{}{:0width$}_{}.{}",
        timestamp.format("%Y%m%d%H%M%S"),
        ordinal,
        snake_case(identifier),
        ARTIFACT_EXTENSION,
        width = width
    )
}

/// Returns the version token of a file name: everything before the first `_`.
#[must_use]
pub fn version(file_name: &str) -> &str {
    file_name.split('_').next().unwrap_or(file_name)
}

/// Returns `dir/file_name`, failing if that file already exists.
pub fn reserve_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let path = dir.join(file_name);
    if path.exists() {
        return Err(MigrateError::Collision(path));
    }
    Ok(path)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Tracks the identifiers issued in one run and those already on disk.
#[derive(Debug, Default)]
pub struct NameGuard {
    issued: HashSet<String>,
    existing: HashSet<String>,
}

impl NameGuard {
    /// Creates a guard that knows nothing about existing artifacts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a guard primed with the artifacts in `dir`.
    ///
    /// A missing directory is treated as empty.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut guard = Self::new();
        if !dir.is_dir() {
            return Ok(guard);
        }

        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some((_, slug)) = stem.split_once('_') {
                guard.existing.insert(slug.to_string());
            }
        }
        Ok(guard)
    }

    /// Validates `identifier` and records it as issued.
    ///
    /// Fails if it is malformed, was already issued in this run, or names an
    /// artifact that already exists in the migrations directory.
    pub fn reserve(&mut self, identifier: &str) -> Result<()> {
        validate_identifier(identifier)?;

        if self.existing.contains(&snake_case(identifier)) {
            return Err(MigrateError::InvalidIdentifier {
                identifier: identifier.to_string(),
                reason: "a migration with this name already exists".to_string(),
            });
        }
        if !self.issued.insert(identifier.to_string()) {
            return Err(MigrateError::InvalidIdentifier {
                identifier: identifier.to_string(),
                reason: "identifier was already issued in this run".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    #[test]
    fn identifier_shape() {
        assert_eq!(
            identifier("seed_users", Action::Update, "users", "1"),
            "SeedUsersUpdateUsers1"
        );
        assert_eq!(
            identifier("Fix", Action::Insert, "user-roles_MAP", "a-1"),
            "FixInsertUserrolesMapa1"
        );
    }

    #[test]
    fn validate_rejects_bad_identifiers() {
        assert!(validate_identifier("SeedInsertUsers1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("seedInsert").is_err());
        assert!(validate_identifier("1Seed").is_err());
        assert!(validate_identifier("Seed Insert").is_err());
        assert!(validate_identifier("SeedÄ").is_err());
    }

    #[test]
    fn snake_case_splits_on_uppercase() {
        assert_eq!(snake_case("SeedInsertUsers1"), "seed_insert_users1");
        assert_eq!(snake_case("ADelete"), "a_delete");
    }

    #[test]
    fn file_name_embeds_timestamp_and_padded_ordinal() {
        let name = file_name(at(), 7, 3, "SeedInsertUsers1");
        assert_eq!(name, "20240305140709007_seed_insert_users1.rs");
        assert_eq!(version(&name), "20240305140709007");
    }

    #[test]
    fn padded_ordinals_sort_lexically() {
        let width = ordinal_width(12);
        assert_eq!(width, 3);
        let mut names: Vec<String> = (1..=12)
            .map(|i| file_name(at(), i, width, "AInsertT1"))
            .collect();
        let expected = names.clone();
        names.sort();
        assert_eq!(names, expected);
        assert_eq!(ordinal_width(1500), 4);
    }

    #[test]
    fn guard_rejects_duplicates_in_run() {
        let mut guard = NameGuard::new();
        guard.reserve("SeedInsertUsers1").unwrap();
        let err = guard.reserve("SeedInsertUsers1").unwrap_err();
        assert!(matches!(err, MigrateError::InvalidIdentifier { .. }));
    }

    #[test]
    fn guard_rejects_names_already_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("20230101000000001_seed_insert_users1.rs"),
            "// existing",
        )
        .unwrap();

        let mut guard = NameGuard::scan(dir.path()).unwrap();
        assert!(guard.reserve("SeedInsertUsers1").is_err());
        assert!(guard.reserve("SeedInsertUsers2").is_ok());
    }

    #[test]
    fn scan_of_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut guard = NameGuard::scan(&dir.path().join("nope")).unwrap();
        assert!(guard.reserve("AInsertT1").is_ok());
    }

    #[test]
    fn reserve_path_detects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = "20240101000000001_a_insert_t1.rs";
        assert!(reserve_path(dir.path(), file).is_ok());

        fs::write(dir.path().join(file), "x").unwrap();
        let err = reserve_path(dir.path(), file).unwrap_err();
        assert!(matches!(err, MigrateError::Collision(p) if p.ends_with(file)));
    }
}
