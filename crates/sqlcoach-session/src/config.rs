//! Configuration types for SQL Coach.
//!
//! This module provides the configuration structures that control the tutor
//! backend, the curriculum and dataset sources, and event streaming.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlCoachError};
use crate::lesson::LessonCatalog;
use crate::seed::DatasetSeed;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "sqlcoach.json";

/// Default model identifier passed to the tutor backend.
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

/// Default environment variable holding the tutor credential.
fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

/// Default tutor backend base URL.
fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

/// Default tutor request timeout in seconds.
const fn default_timeout_seconds() -> u32 {
    30
}

/// Default per-subscriber event buffer.
const fn default_event_capacity() -> usize {
    100
}

/// Main configuration for SQL Coach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Tutor backend settings.
    #[serde(default)]
    pub tutor: TutorConfig,

    /// Optional JSON lesson file replacing the built-in course.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessons_file: Option<String>,

    /// Optional SQL script replacing the built-in dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<String>,

    /// Buffer size of each event stream subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tutor: TutorConfig::default(),
            lessons_file: None,
            seed_file: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `sqlcoach.json` in the current directory. If not found,
    /// returns default configuration.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            SqlCoachError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `sqlcoach.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `SqlCoachError::ConfigParseError` if the file exists but
    /// contains invalid JSON, and `SqlCoachError::ConfigValidationError` if a
    /// value is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(SqlCoachError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| SqlCoachError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// - `tutor.model` and `tutor.apiKeyEnv` must not be empty
    /// - `tutor.timeoutSeconds` must be greater than 0
    /// - `eventCapacity` must be greater than 0
    /// - `lessonsFile` / `seedFile`, when set, must not be empty
    pub fn validate(&self) -> Result<()> {
        if self.tutor.model.trim().is_empty() {
            return Err(SqlCoachError::config_validation(
                "tutor.model must not be empty",
                "Set tutor.model to a model identifier such as 'gemini-2.5-flash' in your sqlcoach.json",
            ));
        }

        if self.tutor.api_key_env.trim().is_empty() {
            return Err(SqlCoachError::config_validation(
                "tutor.apiKeyEnv must not be empty",
                "Set tutor.apiKeyEnv to the name of the environment variable holding your API key",
            ));
        }

        if self.tutor.timeout_seconds == 0 {
            return Err(SqlCoachError::config_validation(
                "tutor.timeoutSeconds must be greater than 0",
                "Set tutor.timeoutSeconds to at least 1 second in your sqlcoach.json",
            ));
        }

        if self.event_capacity == 0 {
            return Err(SqlCoachError::config_validation(
                "eventCapacity must be greater than 0",
                "Set eventCapacity to at least 1 in your sqlcoach.json",
            ));
        }

        if self
            .lessons_file
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(SqlCoachError::config_validation(
                "lessonsFile must not be empty",
                "Remove lessonsFile from your sqlcoach.json to use the built-in course",
            ));
        }

        if self.seed_file.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(SqlCoachError::config_validation(
                "seedFile must not be empty",
                "Remove seedFile from your sqlcoach.json to use the built-in dataset",
            ));
        }

        Ok(())
    }

    /// Builds the lesson catalog named by `lessonsFile`, or the built-in course.
    pub fn lesson_catalog(&self) -> Result<LessonCatalog> {
        match &self.lessons_file {
            Some(path) => LessonCatalog::load(path),
            None => Ok(LessonCatalog::builtin()),
        }
    }

    /// Builds the dataset seed named by `seedFile`, or the built-in dataset.
    pub fn dataset_seed(&self) -> Result<DatasetSeed> {
        match &self.seed_file {
            Some(path) => DatasetSeed::from_file(path),
            None => Ok(DatasetSeed::builtin()),
        }
    }
}

/// Tutor backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TutorConfig {
    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable read at call time for the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL of the `generateContent` API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}
