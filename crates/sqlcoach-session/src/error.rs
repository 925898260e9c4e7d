//! Error types for the SQL Coach session layer.
//!
//! This module defines the error hierarchy for all session operations,
//! including configuration loading, lesson and seed loading, engine
//! readiness, and tutor backend calls.

use std::path::PathBuf;

use sqlcoach_engine::EngineError;

/// A specialized `Result` type for SQL Coach session operations.
pub type Result<T> = std::result::Result<T, SqlCoachError>;

/// Errors that can occur while driving a SQL Coach session.
///
/// Query execution failures are not errors at this level: they are stored
/// as data in the session's outcome. Tutor backend errors are absorbed by the
/// tutor assembler and only ever reach logs.
#[derive(Debug, thiserror::Error)]
pub enum SqlCoachError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your sqlcoach.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Curriculum and Dataset Errors
    // ========================================================================
    /// Lesson file was not found at the specified path.
    #[error("Lesson file not found: '{path}'\n\nSuggestion: Check the 'lessonsFile' field in sqlcoach.json or remove it to use the built-in course")]
    LessonFileNotFound {
        /// Path where the lesson file was expected.
        path: PathBuf,
    },

    /// The lesson catalog violates a structural rule.
    #[error("Invalid lesson catalog: {message}\n\nSuggestion: Provide at least one lesson and give every lesson a unique id")]
    LessonCatalogInvalid {
        /// Description of the violated rule.
        message: String,
    },

    /// Seed script file was not found at the specified path.
    #[error("Seed file not found: '{path}'\n\nSuggestion: Check the 'seedFile' field in sqlcoach.json or remove it to use the built-in dataset")]
    SeedFileNotFound {
        /// Path where the seed script was expected.
        path: PathBuf,
    },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The engine has not finished loading the dataset seed.
    #[error("engine not initialized")]
    EngineNotReady,

    /// The dataset seed could not be loaded into a fresh engine.
    #[error("Failed to load dataset seed: {message}\n\nSuggestion: Check the seed script for SQL errors")]
    SeedLoadFailed {
        /// The engine's diagnostic.
        message: String,
    },

    /// Error raised by the embedded engine outside query execution.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // ========================================================================
    // Tutor Errors
    // ========================================================================
    /// The learner submitted a blank question.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The tutor backend credential is not set.
    #[error("Tutor credential missing: environment variable '{env}' is not set\n\nSuggestion: Export {env} with your API key")]
    MissingCredential {
        /// Name of the environment variable that was read.
        env: String,
    },

    /// The tutor backend returned an error.
    #[error("Tutor backend error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    TutorBackendError {
        /// The kind of backend error.
        kind: TutorErrorKind,
        /// Detailed error message from the backend.
        message: String,
        /// Actionable suggestion for the operator.
        suggestion: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Categories of tutor backend errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorErrorKind {
    /// Authentication failure (invalid API key).
    Authentication,
    /// Rate limit or quota exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues or timeouts.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for TutorErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl TutorErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key",
            Self::RateLimit => "Wait and retry, or check your quota",
            Self::Server => "Retry later; the tutor service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the tutor provider's status page",
        }
    }
}

impl SqlCoachError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `LessonFileNotFound` error.
    #[must_use]
    pub fn lesson_file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::LessonFileNotFound { path: path.into() }
    }

    /// Creates a new `LessonCatalogInvalid` error.
    #[must_use]
    pub fn catalog_invalid(message: impl Into<String>) -> Self {
        Self::LessonCatalogInvalid {
            message: message.into(),
        }
    }

    /// Creates a new `SeedFileNotFound` error.
    #[must_use]
    pub fn seed_file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::SeedFileNotFound { path: path.into() }
    }

    /// Creates a new `SeedLoadFailed` error.
    #[must_use]
    pub fn seed_load_failed(message: impl Into<String>) -> Self {
        Self::SeedLoadFailed {
            message: message.into(),
        }
    }

    /// Creates a new `MissingCredential` error.
    #[must_use]
    pub fn missing_credential(env: impl Into<String>) -> Self {
        Self::MissingCredential { env: env.into() }
    }

    /// Creates a new `TutorBackendError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn tutor_backend(kind: TutorErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::TutorBackendError {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TutorBackendError {
                kind: TutorErrorKind::RateLimit
                    | TutorErrorKind::Server
                    | TutorErrorKind::Network,
                ..
            }
        )
    }

    /// Returns `true` if this error prevents the session from becoming usable.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::LessonFileNotFound { .. }
                | Self::LessonCatalogInvalid { .. }
                | Self::SeedFileNotFound { .. }
                | Self::SeedLoadFailed { .. }
        )
    }
}
