//! Tutor context assembler.
//!
//! Builds one grounded prompt per learner question, forwards it to a
//! [`TutorBackend`], and turns whatever comes back into display text. Backend
//! failures are logged and replaced with a fixed fallback; nothing escapes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Reply used when the backend answers with no text.
pub const EMPTY_REPLY_FALLBACK: &str = "I couldn't generate a response. Please try again.";

/// Reply used when the backend call fails.
pub const BACKEND_FAILURE_FALLBACK: &str = "Sorry, I'm having trouble connecting to the AI tutor right now. Please check your API key configuration.";

/// Session facts captured at the moment a question is asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grounding {
    /// Live query text.
    pub query: String,
    /// Failure message of the last run, if it failed.
    pub error: Option<String>,
    /// Title of the selected lesson.
    pub lesson_title: String,
    /// Instructions of the selected lesson.
    pub lesson_instructions: String,
}

/// A language-model backend that turns prompt text into a completion.
#[async_trait]
pub trait TutorBackend: Send + Sync {
    /// Sends `prompt` to `model` and returns the completion text.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}

/// Assembles prompts and normalizes backend replies.
#[derive(Clone)]
pub struct TutorAssembler {
    backend: Arc<dyn TutorBackend>,
    model: String,
}

impl std::fmt::Debug for TutorAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TutorAssembler")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl TutorAssembler {
    /// Creates an assembler over `backend` using `model` for every request.
    pub fn new(backend: Arc<dyn TutorBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// The model identifier sent to the backend.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Builds the prompt for `question`, embedding `grounding` verbatim.
    #[must_use]
    pub fn build_prompt(question: &str, grounding: &Grounding) -> String {
        format!(
            "You are a helpful and encouraging SQL Tutor.\n\
             \n\
             Current Lesson: {title}\n\
             Instructions: {instructions}\n\
             \n\
             Student's Query:\n\
             ```sql\n\
             {query}\n\
             ```\n\
             \n\
             Error (if any): {error}\n\
             \n\
             Student Question: {question}\n\
             \n\
             Provide a concise, helpful explanation. If there is an error, explain why it \
             happened and hint at how to fix it without directly giving the code unless \
             explicitly asked for the solution. Keep the tone educational.",
            title = grounding.lesson_title,
            instructions = grounding.lesson_instructions,
            query = grounding.query,
            error = grounding.error.as_deref().unwrap_or("None"),
        )
    }

    /// Asks the tutor and returns text suitable for the transcript.
    ///
    /// Never fails: an empty reply becomes [`EMPTY_REPLY_FALLBACK`], a backend
    /// error becomes [`BACKEND_FAILURE_FALLBACK`].
    pub async fn ask(&self, question: &str, grounding: &Grounding) -> String {
        let prompt = Self::build_prompt(question, grounding);
        debug!(model = %self.model, prompt_len = prompt.len(), "Sending tutor prompt");

        match self.backend.generate(&prompt, &self.model).await {
            Ok(reply) if reply.trim().is_empty() => {
                warn!("Tutor backend returned empty text");
                EMPTY_REPLY_FALLBACK.to_string()
            }
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "Tutor backend failed");
                BACKEND_FAILURE_FALLBACK.to_string()
            }
        }
    }
}
