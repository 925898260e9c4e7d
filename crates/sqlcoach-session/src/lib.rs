//! SQL Coach Session
//!
//! Lesson catalog, dataset seed, query execution, tutor conversation, and the
//! session state machine that ties them together, plus the HTTP and WebSocket
//! surface that drives it.

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod gemini;
pub mod lesson;
pub mod query;
pub mod seed;
pub mod session;
pub mod transcript;
pub mod tutor;
pub mod websocket;

pub use api::{
    create_router, AppState, AskRequest, AskResponse, EditQueryRequest, ErrorResponse,
    HealthResponse, LessonsResponse, SelectLessonRequest,
};
pub use config::{Config, TutorConfig};
pub use controller::SessionController;
pub use error::{Result, SqlCoachError, TutorErrorKind};
pub use gemini::GeminiBackend;
pub use lesson::{Lesson, LessonCatalog};
pub use query::{execute, Outcome, ENGINE_NOT_INITIALIZED};
pub use seed::{DatasetSeed, DEFAULT_SEED_SQL};
pub use session::{
    LessonChange, LessonSummary, PendingAsk, Progress, Session, SessionSnapshot, SessionStatus,
};
pub use transcript::{Message, Role, Transcript, GREETING};
pub use tutor::{
    Grounding, TutorAssembler, TutorBackend, BACKEND_FAILURE_FALLBACK, EMPTY_REPLY_FALLBACK,
};
pub use websocket::{EventBroadcaster, SessionEvent};
