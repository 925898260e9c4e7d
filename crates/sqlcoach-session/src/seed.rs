//! Dataset seed: the schema-plus-data script every engine starts from.

use std::path::Path;

use sqlcoach_engine::Engine;
use tracing::{debug, info};

use crate::error::{Result, SqlCoachError};

/// Built-in dataset: six employees and three projects.
pub const DEFAULT_SEED_SQL: &str = "
CREATE TABLE employees (
  id INTEGER PRIMARY KEY,
  name TEXT,
  department TEXT,
  salary INTEGER,
  hire_date TEXT
);

INSERT INTO employees (name, department, salary, hire_date) VALUES
('Alice Johnson', 'Engineering', 95000, '2021-03-15'),
('Bob Smith', 'Marketing', 65000, '2020-06-22'),
('Charlie Brown', 'Engineering', 88000, '2019-11-05'),
('Diana Ross', 'HR', 72000, '2022-01-10'),
('Evan Wright', 'Marketing', 62000, '2023-05-18'),
('Fiona Green', 'Engineering', 105000, '2018-09-30');

CREATE TABLE projects (
  id INTEGER PRIMARY KEY,
  title TEXT,
  budget INTEGER,
  lead_id INTEGER,
  FOREIGN KEY(lead_id) REFERENCES employees(id)
);

INSERT INTO projects (title, budget, lead_id) VALUES
('Website Redesign', 5000, 2),
('Mobile App', 15000, 1),
('HR Portal', 8000, 4);
";

/// A fixed schema-plus-data script.
///
/// The same script is replayed on every fresh engine, so results are
/// reproducible across sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSeed {
    script: String,
}

impl DatasetSeed {
    /// Wraps an arbitrary script.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// The built-in employees/projects dataset.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(DEFAULT_SEED_SQL)
    }

    /// Reads a seed script from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(script) => Ok(Self::new(script)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SqlCoachError::seed_file_not_found(path))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The raw script text.
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }

    /// Runs the script against `engine`.
    ///
    /// # Errors
    ///
    /// Returns `SqlCoachError::SeedLoadFailed` carrying the engine diagnostic
    /// if any statement fails.
    pub fn load(&self, engine: &Engine) -> Result<()> {
        engine
            .run_script(&self.script)
            .map_err(|e| SqlCoachError::seed_load_failed(e.to_string()))?;
        debug!("Dataset seed loaded");
        Ok(())
    }

    /// Creates a fresh engine and loads the seed into it.
    pub fn create_engine(&self) -> Result<Engine> {
        let engine = Engine::create()?;
        self.load(&engine)?;
        info!("Seeded engine ready");
        Ok(engine)
    }
}

impl Default for DatasetSeed {
    fn default() -> Self {
        Self::builtin()
    }
}
