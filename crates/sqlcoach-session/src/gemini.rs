//! Gemini REST backend for the tutor.
//!
//! Calls `generateContent` with a single user turn and returns the joined text
//! parts of the first candidate. The API key is read from the configured
//! environment variable on every call, so a missing key only fails the call.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TutorConfig;
use crate::error::{Result, SqlCoachError, TutorErrorKind};
use crate::tutor::TutorBackend;

/// Tutor backend talking to the Gemini HTTP API.
#[derive(Debug, Clone)]
pub struct GeminiBackend {
    client: Client,
    endpoint: String,
    api_key_env: String,
}

impl GeminiBackend {
    /// Creates a backend from tutor settings.
    pub fn new(config: &TutorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_seconds)))
            .build()
            .map_err(|e| {
                SqlCoachError::tutor_backend(
                    TutorErrorKind::Other,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(SqlCoachError::missing_credential(&self.api_key_env)),
        }
    }
}

#[async_trait]
impl TutorBackend for GeminiBackend {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let api_key = self.api_key()?;
        let url = format!(
            "{endpoint}/{model}:generateContent?key={api_key}",
            endpoint = self.endpoint,
        );

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        debug!(model, "Calling Gemini generateContent");
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SqlCoachError::tutor_backend(
                    TutorErrorKind::Network,
                    format!("Gemini API request failed: {}", e.without_url()),
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            SqlCoachError::tutor_backend(
                TutorErrorKind::Other,
                format!("Failed to parse Gemini response: {}", e.without_url()),
            )
        })?;

        Ok(extract_text(parsed))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Joins the text parts of the first candidate.
///
/// A reply without text (no candidates, or a blocked candidate) yields an
/// empty string rather than an error.
fn extract_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default()
}

fn map_http_error(status: StatusCode, body: &str) -> SqlCoachError {
    let message = serde_json::from_str::<ErrorWrapper>(body).map_or_else(
        |_| body.to_string(),
        |wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status_text) if !status_text.is_empty() => format!("{status_text}: {msg}"),
                _ => msg,
            }
        },
    );

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TutorErrorKind::Authentication,
        StatusCode::TOO_MANY_REQUESTS => TutorErrorKind::RateLimit,
        s if s.is_server_error() => TutorErrorKind::Server,
        _ => TutorErrorKind::Other,
    };

    SqlCoachError::tutor_backend(kind, format!("HTTP {}: {message}", status.as_u16()))
}
