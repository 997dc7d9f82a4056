//! Content generator abstraction and implementations
//!
//! Provides the [`ContentGenerator`] trait and two implementations:
//! - [`StaticGenerator`]: returns a fixed artifact (demo and tests)
//! - [`HttpGenerator`]: POSTs the prompt to a remote generation endpoint
//!
//! Remote failures are classified from the HTTP status, never from message
//! text, so the retry policy can decide on structure alone.

use crate::GenerationError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Structured prompt sent to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPrompt {
    /// Caller-supplied correlation id.
    pub request_id: String,
    /// Subject of the course.
    pub topic: String,
    /// Learning track, e.g. `developer`.
    pub track: String,
    /// Difficulty label.
    pub difficulty: String,
    /// Number of lessons wanted.
    pub lesson_count: u32,
    /// Output requirements the generated course is scored against.
    pub requirements: Vec<String>,
}

/// Produces a raw course artifact for a prompt.
///
/// Implementations must be thread-safe (Send + Sync) for use across tasks.
/// The trait is object-safe to allow dynamic dispatch via `Arc<dyn ContentGenerator>`.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generate raw, not yet validated, course JSON.
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<serde_json::Value, GenerationError>;
}

// ============================================================================
// Static Generator (Testing)
// ============================================================================

/// Returns the same artifact for every prompt.
pub struct StaticGenerator {
    artifact: serde_json::Value,
    delay: Duration,
}

impl StaticGenerator {
    /// Generator that answers immediately with `artifact`.
    pub fn new(artifact: serde_json::Value) -> Self {
        Self {
            artifact,
            delay: Duration::ZERO,
        }
    }

    /// Simulate service latency.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ContentGenerator for StaticGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<serde_json::Value, GenerationError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        debug!(request_id = %prompt.request_id, "static generator: returning fixed artifact");
        Ok(self.artifact.clone())
    }
}

// ============================================================================
// HTTP Generator
// ============================================================================

/// Remote generation service reached over HTTP.
///
/// ## Example
///
/// ```no_run
/// use course_generation_gate::HttpGenerator;
/// use std::time::Duration;
///
/// let generator = HttpGenerator::new("http://localhost:8080/generate", "secret")
///     .expect("non-empty key")
///     .with_timeout(Duration::from_secs(90));
/// ```
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpGenerator {
    /// Create a generator for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Config`] if `api_key` is empty.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::Config(
                "generation service API key is not set".to_string(),
            ));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            timeout: Duration::from_secs(60),
        })
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success HTTP response onto the error taxonomy.
fn classify(status: StatusCode, retry_after: Option<Duration>, body: String) -> GenerationError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body
    };
    match status.as_u16() {
        401 | 403 => GenerationError::Authentication(message),
        429 => GenerationError::RateLimit {
            message,
            retry_after,
        },
        400 | 422 => GenerationError::Validation {
            errors: vec![message],
        },
        code => GenerationError::Service {
            code: "http_error".to_string(),
            status: Some(code),
            message,
            retryable: true,
        },
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate(&self, prompt: &GenerationPrompt) -> Result<serde_json::Value, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(prompt)
            .send()
            .await
            .map_err(|e| {
                GenerationError::service("transport", format!("generation request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            debug!(
                request_id = %prompt.request_id,
                status = status.as_u16(),
                "http generator: non-success response"
            );
            return Err(classify(status, retry_after, body));
        }

        response.json::<serde_json::Value>().await.map_err(|e| {
            GenerationError::service("decode", format!("failed to parse generation response: {e}"))
        })
    }
}
