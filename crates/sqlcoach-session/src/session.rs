//! The learner session state machine.
//!
//! A [`Session`] starts `Uninitialized`, becomes `Ready` once the dataset seed
//! is loaded into a fresh engine, and from then on carries its state as plain
//! data: selected lesson, live query, last outcome, and transcript. Every
//! transition here is synchronous; the async wrapper lives in
//! [`crate::controller`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlcoach_engine::Engine;
use tracing::{debug, info, warn};

use crate::error::{Result, SqlCoachError};
use crate::lesson::{Lesson, LessonCatalog};
use crate::query::{self, Outcome};
use crate::seed::DatasetSeed;
use crate::transcript::{Message, Role, Transcript};
use crate::tutor::Grounding;

/// Engine readiness of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No engine is loaded; learner events are rejected.
    Uninitialized,
    /// The seeded engine is loaded.
    Ready,
}

/// Marker returned when a tutor question has been accepted.
///
/// Carries the grounding captured at ask time; the reply is appended later
/// with [`Session::complete_ask`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAsk {
    /// Per-session sequence number of the question.
    pub ticket: u64,
    /// The learner's question.
    pub question: String,
    /// Session facts at ask time.
    pub grounding: Grounding,
    /// When the learner message was appended.
    pub asked_at: DateTime<Utc>,
}

/// Course position, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// `index + 1` of the selected lesson.
    pub position: usize,
    /// Number of lessons in the course.
    pub total: usize,
}

impl Progress {
    /// Fraction of the course reached, in `(0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        self.position as f64 / self.total as f64
    }
}

/// One row of the lesson listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSummary {
    /// Catalog index.
    pub index: usize,
    /// The lesson, without its solution.
    #[serde(flatten)]
    pub lesson: Lesson,
    /// Lessons before the selected one count as completed.
    pub completed: bool,
    /// Whether this is the selected lesson.
    pub current: bool,
}

/// Result of a lesson navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonChange {
    /// Whether the selected lesson changed.
    pub changed: bool,
    /// Selected lesson index afterwards.
    pub lesson_index: usize,
    /// Course position afterwards.
    pub progress: Progress,
}

/// Serializable view of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Engine readiness.
    pub status: SessionStatus,
    /// Selected lesson index.
    pub lesson_index: usize,
    /// Selected lesson, without its solution.
    pub lesson: Lesson,
    /// Live query text.
    pub query: String,
    /// Outcome of the most recent run, if any.
    pub outcome: Option<Outcome>,
    /// Conversation so far.
    pub transcript: Transcript,
    /// Course position.
    pub progress: Progress,
}

/// Mutable state of one learner interaction.
#[derive(Debug)]
pub struct Session {
    catalog: LessonCatalog,
    seed: DatasetSeed,
    engine: Option<Engine>,
    lesson_index: usize,
    query: String,
    outcome: Option<Outcome>,
    transcript: Transcript,
    next_ticket: u64,
}

impl Session {
    /// Creates an uninitialized session positioned on the entry lesson.
    pub fn new(catalog: LessonCatalog, seed: DatasetSeed) -> Self {
        let query = catalog.entry().initial_query.clone();
        Self {
            catalog,
            seed,
            engine: None,
            lesson_index: 0,
            query,
            outcome: None,
            transcript: Transcript::default(),
            next_ticket: 1,
        }
    }

    /// Loads the dataset seed into a fresh engine.
    ///
    /// The first successful load opens the transcript with the greeting. A
    /// failed load leaves the session `Uninitialized`. Calling this on a
    /// ready session does nothing.
    pub fn initialize(&mut self) -> Result<()> {
        if self.engine.is_some() {
            return Ok(());
        }

        match self.seed.create_engine() {
            Ok(engine) => {
                self.engine = Some(engine);
                if self.transcript.is_empty() {
                    self.transcript = Transcript::with_greeting();
                }
                info!(lessons = self.catalog.count(), "Session ready");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session initialization failed");
                Err(e)
            }
        }
    }

    /// Engine readiness.
    pub const fn status(&self) -> SessionStatus {
        if self.engine.is_some() {
            SessionStatus::Ready
        } else {
            SessionStatus::Uninitialized
        }
    }

    const fn ensure_ready(&self) -> Result<()> {
        if self.engine.is_some() {
            Ok(())
        } else {
            Err(SqlCoachError::EngineNotReady)
        }
    }

    // ========================================================================
    // Lesson navigation
    // ========================================================================

    /// Selects lesson `index`, resetting the query and clearing the outcome.
    ///
    /// Returns `Ok(false)` without changing anything when `index` is out of
    /// range.
    pub fn select_lesson(&mut self, index: usize) -> Result<bool> {
        self.ensure_ready()?;

        let Some(lesson) = self.catalog.get(index) else {
            debug!(index, count = self.catalog.count(), "Ignoring out-of-range lesson");
            return Ok(false);
        };

        self.query.clone_from(&lesson.initial_query);
        self.lesson_index = index;
        self.outcome = None;
        info!(index, lesson_id = %lesson.id, "Lesson selected");
        Ok(true)
    }

    /// Moves to the following lesson. No-op on the last lesson.
    pub fn next_lesson(&mut self) -> Result<bool> {
        self.select_lesson(self.lesson_index + 1)
    }

    /// Moves to the preceding lesson. No-op on the first lesson.
    pub fn previous_lesson(&mut self) -> Result<bool> {
        match self.lesson_index.checked_sub(1) {
            Some(index) => self.select_lesson(index),
            None => {
                self.ensure_ready()?;
                Ok(false)
            }
        }
    }

    // ========================================================================
    // Query editing and execution
    // ========================================================================

    /// Replaces the live query text. The last outcome is kept.
    pub fn edit_query(&mut self, text: impl Into<String>) -> Result<()> {
        self.ensure_ready()?;
        self.query = text.into();
        Ok(())
    }

    /// Runs the live query and stores the outcome.
    pub fn run(&mut self) -> Result<&Outcome> {
        self.ensure_ready()?;
        let outcome = query::execute(&self.query, self.engine.as_ref());
        debug!(success = outcome.is_success(), "Query run");
        Ok(self.outcome.insert(outcome))
    }

    /// Restores the selected lesson's initial query and clears the outcome.
    pub fn reset_query(&mut self) -> Result<()> {
        self.ensure_ready()?;
        self.query = self.current_lesson().initial_query.clone();
        self.outcome = None;
        Ok(())
    }

    /// Replaces the engine with a freshly seeded one.
    ///
    /// Lesson, query, outcome and transcript are kept. If seeding fails the
    /// session drops back to `Uninitialized`. On an `Uninitialized` session
    /// this retries the initial load.
    pub fn reset_database(&mut self) -> Result<()> {
        self.engine = None;
        self.initialize()?;
        info!("Database reset");
        Ok(())
    }

    // ========================================================================
    // Tutor conversation
    // ========================================================================

    /// Snapshot of the facts a tutor question is grounded on.
    pub fn grounding(&self) -> Grounding {
        let lesson = self.current_lesson();
        Grounding {
            query: self.query.clone(),
            error: self
                .outcome
                .as_ref()
                .and_then(Outcome::error_message)
                .map(str::to_string),
            lesson_title: lesson.title.clone(),
            lesson_instructions: lesson.instructions.clone(),
        }
    }

    /// First phase of a tutor question: appends the learner message.
    ///
    /// # Errors
    ///
    /// Returns `SqlCoachError::EmptyQuestion` for blank input, leaving the
    /// transcript untouched.
    pub fn begin_ask(&mut self, question: &str) -> Result<PendingAsk> {
        self.ensure_ready()?;

        let question = question.trim();
        if question.is_empty() {
            return Err(SqlCoachError::EmptyQuestion);
        }

        let grounding = self.grounding();
        let asked_at = self
            .transcript
            .append(Message::new(Role::Learner, question))
            .timestamp;

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        debug!(ticket, "Tutor question accepted");

        Ok(PendingAsk {
            ticket,
            question: question.to_string(),
            grounding,
            asked_at,
        })
    }

    /// Second phase of a tutor question: appends the tutor reply.
    pub fn complete_ask(&mut self, pending: &PendingAsk, reply: impl Into<String>) -> &Message {
        debug!(ticket = pending.ticket, "Tutor reply appended");
        self.transcript.append(Message::new(Role::Tutor, reply))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The lesson catalog.
    pub const fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    /// Selected lesson index.
    pub const fn lesson_index(&self) -> usize {
        self.lesson_index
    }

    /// Selected lesson.
    pub fn current_lesson(&self) -> &Lesson {
        self.catalog
            .get(self.lesson_index)
            .unwrap_or_else(|| self.catalog.entry())
    }

    /// Live query text.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Outcome of the most recent run.
    pub const fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// The conversation transcript.
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Course position.
    pub fn progress(&self) -> Progress {
        Progress {
            position: self.lesson_index + 1,
            total: self.catalog.count(),
        }
    }

    /// Lesson listing with completion markers.
    pub fn lessons(&self) -> Vec<LessonSummary> {
        self.catalog
            .iter()
            .enumerate()
            .map(|(index, lesson)| LessonSummary {
                index,
                lesson: lesson.clone(),
                completed: index < self.lesson_index,
                current: index == self.lesson_index,
            })
            .collect()
    }

    /// Serializable view of the whole session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(),
            lesson_index: self.lesson_index,
            lesson: self.current_lesson().clone(),
            query: self.query.clone(),
            outcome: self.outcome.clone(),
            transcript: self.transcript.clone(),
            progress: self.progress(),
        }
    }
}
