//! SQL Coach Embedded Engine
//!
//! In-memory SQLite engine boundary via rusqlite.
//!
//! This crate provides the engine handle and the typed result shapes that the
//! SQL Coach session layer executes learner queries against.

mod engine;

pub use engine::Engine;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the embedded engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not be created.
    #[error("engine not loaded: {0}")]
    Unavailable(String),

    /// SQLite rejected or failed a statement.
    ///
    /// Displays SQLite's own diagnostic unchanged.
    #[error("{0}")]
    Sql(#[from] rusqlite::Error),
}

/// A single result cell.
///
/// Serializes untagged, so cells render as plain JSON `null`, numbers, and
/// strings. Blobs are converted to text (lossy UTF-8).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Double precision float.
    Real(f64),
    /// Text, or a blob rendered as text.
    Text(String),
}

impl Value {
    /// Returns `true` for SQL `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for integer and real cells.
    #[must_use]
    pub const fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Real(_))
    }

    /// Returns the numeric value of an integer or real cell.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(r) => Some(*r),
            Self::Null | Self::Text(_) => None,
        }
    }

    /// Returns the text of a text cell.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<rusqlite::types::ValueRef<'_>> for Value {
    fn from(value: rusqlite::types::ValueRef<'_>) -> Self {
        use rusqlite::types::ValueRef;

        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(r) => Self::Real(r),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Self::Text(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// Rows produced by one row-returning statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names in statement order.
    pub columns: Vec<String>,
    /// Row values; every row has `columns.len()` cells.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Number of rows in the set.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
