//! Scalar cell values.
//!
//! Snapshots only carry flat scalars: strings, numbers and NULL. Values are
//! compared by their string cast so that `1`, `1.0` and `"1"` are the same
//! cell, while NULL stays distinct from the empty string.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A nullable scalar stored in a table cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Integer number.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string cast used for comparisons, or `None` for NULL.
    #[must_use]
    pub fn normalized(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Integer(i) => Some(Cow::Owned(i.to_string())),
            Self::Float(f) => Some(Cow::Owned(f.to_string())),
            Self::Text(s) => Some(Cow::Borrowed(s)),
        }
    }

    /// Compares two values by their normalized form.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }

    /// Rebuilds a value from a string-normalized row key.
    ///
    /// Canonical integers become [`Value::Integer`], everything else is kept
    /// as text.
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key.parse::<i64>() {
            Ok(i) if i.to_string() == key => Self::Integer(i),
            _ => Self::Text(key.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.normalized() {
            Some(s) => f.write_str(&s),
            None => f.write_str("NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
