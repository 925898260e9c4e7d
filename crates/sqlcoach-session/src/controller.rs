//! Async session controller.
//!
//! Wraps one [`Session`] behind a Tokio mutex, locks it once per learner
//! event, and broadcasts the resulting change. Tutor backend calls happen
//! outside the lock, so runs and lesson changes are never blocked by a slow
//! tutor.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::query::Outcome;
use crate::session::{
    LessonChange, LessonSummary, PendingAsk, Progress, Session, SessionSnapshot,
};
use crate::transcript::Message;
use crate::tutor::TutorAssembler;
use crate::websocket::{EventBroadcaster, SessionEvent};

/// Shared handle driving one learner session.
///
/// Cloning is cheap; all clones drive the same session.
#[derive(Debug, Clone)]
pub struct SessionController {
    session: Arc<Mutex<Session>>,
    tutor: Arc<TutorAssembler>,
    broadcaster: EventBroadcaster,
}

impl SessionController {
    /// Creates a controller over an existing session.
    pub fn new(session: Session, tutor: TutorAssembler, broadcaster: EventBroadcaster) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            tutor: Arc::new(tutor),
            broadcaster,
        }
    }

    /// The event broadcaster fed by this controller.
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Loads the dataset seed and reports the resulting engine status.
    pub async fn initialize(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let result = session.initialize();
        if let Err(e) = &result {
            self.broadcaster.send(SessionEvent::error(e.to_string()));
        }
        self.broadcaster
            .send(SessionEvent::engine_status(session.status()));
        result
    }

    /// Current session view.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Lesson listing with completion markers, and the course position it
    /// was taken at.
    pub async fn lessons(&self) -> (Vec<LessonSummary>, Progress) {
        let session = self.session.lock().await;
        (session.lessons(), session.progress())
    }

    // ========================================================================
    // Lesson navigation
    // ========================================================================

    /// Selects lesson `index`. Out-of-range indices leave the session as is.
    pub async fn select_lesson(&self, index: usize) -> Result<LessonChange> {
        let mut session = self.session.lock().await;
        let changed = session.select_lesson(index)?;
        Ok(self.announce_lesson(&session, changed))
    }

    /// Moves to the next lesson, if there is one.
    pub async fn next_lesson(&self) -> Result<LessonChange> {
        let mut session = self.session.lock().await;
        let changed = session.next_lesson()?;
        Ok(self.announce_lesson(&session, changed))
    }

    /// Moves to the previous lesson, if there is one.
    pub async fn previous_lesson(&self) -> Result<LessonChange> {
        let mut session = self.session.lock().await;
        let changed = session.previous_lesson()?;
        Ok(self.announce_lesson(&session, changed))
    }

    fn announce_lesson(&self, session: &Session, changed: bool) -> LessonChange {
        if changed {
            self.broadcaster.send(SessionEvent::lesson_selected(
                session.lesson_index(),
                session.current_lesson().clone(),
                session.query().to_string(),
                session.progress(),
            ));
        }
        LessonChange {
            changed,
            lesson_index: session.lesson_index(),
            progress: session.progress(),
        }
    }

    // ========================================================================
    // Query editing and execution
    // ========================================================================

    /// Replaces the live query text.
    pub async fn edit_query(&self, text: String) -> Result<()> {
        let mut session = self.session.lock().await;
        session.edit_query(text)?;
        self.broadcaster
            .send(SessionEvent::query_changed(session.query().to_string(), false));
        Ok(())
    }

    /// Runs the live query and returns its outcome.
    pub async fn run(&self) -> Result<Outcome> {
        let mut session = self.session.lock().await;
        let outcome = session.run()?.clone();
        self.broadcaster.send(SessionEvent::query_executed(
            session.query().to_string(),
            outcome.clone(),
        ));
        Ok(outcome)
    }

    /// Restores the lesson's initial query and clears the outcome.
    pub async fn reset_query(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.reset_query()?;
        self.broadcaster
            .send(SessionEvent::query_changed(session.query().to_string(), true));
        Ok(())
    }

    /// Re-seeds the engine, keeping learner state.
    pub async fn reset_database(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let result = session.reset_database();
        if let Err(e) = &result {
            self.broadcaster.send(SessionEvent::error(e.to_string()));
        }
        self.broadcaster
            .send(SessionEvent::engine_status(session.status()));
        result
    }

    // ========================================================================
    // Tutor conversation
    // ========================================================================

    /// Asks the tutor and waits for the reply.
    ///
    /// Returns the appended tutor message. Backend failures come back as a
    /// fallback message, never as an error.
    pub async fn ask_tutor(&self, question: &str) -> Result<Message> {
        let pending = self.begin_ask(question).await?;
        Ok(self.complete_ask(&pending).await)
    }

    /// Accepts a tutor question and answers it in the background.
    ///
    /// The learner message is appended before this returns; the tutor reply
    /// is appended (and broadcast) by a spawned task whenever it arrives.
    pub async fn dispatch_ask(&self, question: &str) -> Result<PendingAsk> {
        let pending = self.begin_ask(question).await?;

        let controller = self.clone();
        let task_pending = pending.clone();
        tokio::spawn(async move {
            controller.complete_ask(&task_pending).await;
        });

        Ok(pending)
    }

    async fn begin_ask(&self, question: &str) -> Result<PendingAsk> {
        let mut session = self.session.lock().await;
        let pending = session.begin_ask(question)?;
        if let Some(message) = session.transcript().last() {
            self.broadcaster.send(SessionEvent::transcript_appended(
                message.clone(),
                pending.ticket,
            ));
        }
        info!(ticket = pending.ticket, "Tutor question dispatched");
        Ok(pending)
    }

    async fn complete_ask(&self, pending: &PendingAsk) -> Message {
        // The session lock is not held while the backend works
        let reply = self.tutor.ask(&pending.question, &pending.grounding).await;

        let mut session = self.session.lock().await;
        let message = session.complete_ask(pending, reply).clone();
        self.broadcaster.send(SessionEvent::transcript_appended(
            message.clone(),
            pending.ticket,
        ));
        debug!(ticket = pending.ticket, "Tutor question answered");
        message
    }
}
