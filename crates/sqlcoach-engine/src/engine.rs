//! Embedded engine handle for SQL Coach.
//!
//! This module provides the [`Engine`] struct, which owns one in-memory
//! SQLite connection through the rusqlite crate.

use rusqlite::{Batch, Connection};
use tracing::{debug, instrument};

use crate::{EngineError, ResultSet, Value};

/// An in-memory SQL engine instance.
///
/// Each `Engine` owns its own connection, so independent sessions never share
/// tables.
///
/// # Example
///
/// ```
/// use sqlcoach_engine::Engine;
///
/// # fn example() -> Result<(), sqlcoach_engine::EngineError> {
/// let engine = Engine::create()?;
/// engine.run_script("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")?;
/// let results = engine.exec("SELECT x FROM t")?;
/// assert_eq!(results[0].columns, vec!["x"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine {
    conn: Connection,
}

impl Engine {
    /// Creates a fresh, empty in-memory engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] if SQLite cannot open the database.
    #[instrument]
    pub fn create() -> Result<Self, EngineError> {
        let conn =
            Connection::open_in_memory().map_err(|e| EngineError::Unavailable(e.to_string()))?;
        debug!("Opened in-memory engine");
        Ok(Self { conn })
    }

    /// Runs a script of statements, discarding any rows.
    ///
    /// Stops at the first failing statement.
    #[instrument(skip(self, script), fields(script_len = script.len()))]
    pub fn run_script(&self, script: &str) -> Result<(), EngineError> {
        self.conn.execute_batch(script)?;
        debug!("Script executed");
        Ok(())
    }

    /// Executes arbitrary SQL and returns every result set it produced.
    ///
    /// Statements run in order. Each statement that declares result columns
    /// contributes one [`ResultSet`], even when it yields zero rows; DDL and
    /// DML statements contribute nothing. Execution stops at the first error,
    /// leaving the effects of earlier statements in place.
    #[instrument(skip(self, sql), fields(sql_len = sql.len()))]
    pub fn exec(&self, sql: &str) -> Result<Vec<ResultSet>, EngineError> {
        let mut results = Vec::new();
        let mut batch = Batch::new(&self.conn, sql);

        while let Some(mut stmt) = batch.next()? {
            let column_count = stmt.column_count();
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            let mut rows = stmt.query([])?;
            let mut collected = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(column_count);
                for idx in 0..column_count {
                    values.push(Value::from(row.get_ref(idx)?));
                }
                collected.push(values);
            }

            if column_count > 0 {
                results.push(ResultSet {
                    columns,
                    rows: collected,
                });
            }
        }

        debug!(result_sets = results.len(), "SQL executed");
        Ok(results)
    }
}
