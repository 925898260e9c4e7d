//! Query execution adapter.
//!
//! Pass-through from learner SQL to the engine, normalized into an
//! [`Outcome`]. No validation, no recovery: engine diagnostics are carried
//! verbatim.

use serde::{Deserialize, Serialize};
use sqlcoach_engine::{Engine, Value};
use tracing::debug;

/// Failure message used when no engine is loaded.
pub const ENGINE_NOT_INITIALIZED: &str = "engine not initialized";

/// Result of one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The engine accepted the input.
    ///
    /// `columns` and `rows` are empty when no statement produced a result set.
    Success {
        /// Column names of the surfaced result set.
        columns: Vec<String>,
        /// Rows of the surfaced result set.
        rows: Vec<Vec<Value>>,
    },
    /// The engine raised an error.
    Failure {
        /// The engine's own diagnostic.
        message: String,
    },
}

impl Outcome {
    /// Returns `true` for a success outcome.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The failure message, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure { message } => Some(message),
            Self::Success { .. } => None,
        }
    }
}

/// Executes `query` against `engine`.
///
/// Every statement runs, but only the first result set is surfaced. With no
/// engine the call short-circuits to a failure without touching SQL.
pub fn execute(query: &str, engine: Option<&Engine>) -> Outcome {
    let Some(engine) = engine else {
        return Outcome::Failure {
            message: ENGINE_NOT_INITIALIZED.to_string(),
        };
    };

    match engine.exec(query) {
        Ok(results) => {
            let surfaced = results.into_iter().next().unwrap_or_default();
            debug!(
                columns = surfaced.columns.len(),
                rows = surfaced.rows.len(),
                "Query succeeded"
            );
            Outcome::Success {
                columns: surfaced.columns,
                rows: surfaced.rows,
            }
        }
        Err(e) => {
            debug!(error = %e, "Query failed");
            Outcome::Failure {
                message: e.to_string(),
            }
        }
    }
}
