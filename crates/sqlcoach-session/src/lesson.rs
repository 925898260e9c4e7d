//! Lesson records and the ordered lesson catalog.
//!
//! The catalog is immutable after construction. Its order is the course
//! order and index 0 is the entry point.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SqlCoachError};

/// One curriculum unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    /// Unique, stable identifier.
    pub id: String,
    /// Short lesson title.
    pub title: String,
    /// One-line summary of what the lesson teaches.
    pub description: String,
    /// The task the learner is asked to solve.
    pub instructions: String,
    /// Optional nudge shown on request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Query text placed in the editor when the lesson is selected.
    pub initial_query: String,
    /// Reference solution. Never sent to the learner surface.
    #[serde(default, skip_serializing)]
    pub solution: String,
}

impl Lesson {
    fn new(
        id: &str,
        title: &str,
        description: &str,
        instructions: &str,
        initial_query: &str,
        hint: &str,
        solution: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            instructions: instructions.to_string(),
            hint: Some(hint.to_string()),
            initial_query: initial_query.to_string(),
            solution: solution.to_string(),
        }
    }
}

/// Ordered, read-only sequence of lessons.
///
/// Always holds at least one lesson, and ids are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
}

impl LessonCatalog {
    /// Builds a catalog from lessons in course order.
    ///
    /// # Errors
    ///
    /// Returns `SqlCoachError::LessonCatalogInvalid` if `lessons` is empty or
    /// two lessons share an id.
    pub fn new(lessons: Vec<Lesson>) -> Result<Self> {
        if lessons.is_empty() {
            return Err(SqlCoachError::catalog_invalid(
                "catalog must contain at least one lesson",
            ));
        }

        let mut seen = HashSet::new();
        for lesson in &lessons {
            if !seen.insert(lesson.id.as_str()) {
                return Err(SqlCoachError::catalog_invalid(format!(
                    "duplicate lesson id '{}'",
                    lesson.id
                )));
            }
        }

        Ok(Self { lessons })
    }

    /// The built-in five-lesson course over the built-in dataset.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            lessons: builtin_lessons(),
        }
    }

    /// Loads a catalog from a JSON array of lessons.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SqlCoachError::lesson_file_not_found(path));
            }
            Err(e) => return Err(e.into()),
        };

        let lessons: Vec<Lesson> = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), count = lessons.len(), "Loaded lesson file");
        Self::new(lessons)
    }

    /// Returns the lesson at `index`, or `None` when out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Lesson> {
        self.lessons.get(index)
    }

    /// The first lesson of the course.
    #[must_use]
    pub fn entry(&self) -> &Lesson {
        &self.lessons[0]
    }

    /// Number of lessons.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lessons.len()
    }

    /// Iterates lessons in course order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Lesson> + ExactSizeIterator {
        self.lessons.iter()
    }
}

impl Default for LessonCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_lessons() -> Vec<Lesson> {
    vec![
        Lesson::new(
            "1",
            "Select Everything",
            "Learn how to retrieve all data from a table.",
            "Retrieve all columns from the `employees` table using the `SELECT *` syntax.",
            "SELECT * FROM employees;",
            "Use the asterisk (*) wildcard to select all columns.",
            "SELECT * FROM employees;",
        ),
        Lesson::new(
            "2",
            "Specific Columns",
            "Retrieve only the data you need.",
            "Select only the `name` and `salary` of all employees.",
            "SELECT ... FROM employees;",
            "List the column names separated by commas instead of using *.",
            "SELECT name, salary FROM employees;",
        ),
        Lesson::new(
            "3",
            "Filtering Data",
            "Use the WHERE clause to filter results.",
            "Find all employees who work in the 'Engineering' department.",
            "SELECT * FROM employees WHERE ...;",
            "Use `department = 'Engineering'` in your WHERE clause.",
            "SELECT * FROM employees WHERE department = 'Engineering';",
        ),
        Lesson::new(
            "4",
            "Sorting Results",
            "Order your data meaningfully.",
            "List all employees ordered by their `salary` in descending order (highest first).",
            "SELECT * FROM employees ORDER BY ...;",
            "Use `ORDER BY salary DESC`.",
            "SELECT * FROM employees ORDER BY salary DESC;",
        ),
        Lesson::new(
            "5",
            "Aggregation",
            "Calculate summary statistics.",
            "Calculate the average salary of all employees. Name the column `avg_salary`.",
            "SELECT ... FROM employees;",
            "Use the `AVG(column)` function.",
            "SELECT AVG(salary) as avg_salary FROM employees;",
        ),
    ]
}
