//! # course-generation-gate
//!
//! Admission control, retry orchestration and quality scoring for calls to a
//! rate-limited, quota-capped course generation service.
//!
//! ## Architecture
//!
//! ```text
//! GenerationRequest → validate → AdmissionController::acquire
//!     → RetryPolicy::call_with_retry(ContentGenerator::generate)
//!     → ArtifactValidator → QualityScorer → (Course, QualityReport)
//! ```
//!
//! The caller owns the persistence decision: only artifacts whose
//! [`QualityReport::passed`] is `true` should be saved.

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod artifact;
pub mod config;
pub mod gate;
pub mod generator;
pub mod metrics;
pub mod quality;
pub mod request;
pub mod resilience;
pub mod validator;

// Re-exports for convenience
pub use artifact::{Course, CourseMetadata, Lesson, LessonContent, LessonKind, Question};
pub use config::GateConfig;
pub use gate::{GenerationGate, GenerationOutcome};
pub use generator::{ContentGenerator, GenerationPrompt, HttpGenerator, StaticGenerator};
pub use quality::{QualityIssue, QualityReport, QualityScorer, Severity};
pub use request::GenerationRequest;
pub use resilience::{AdmissionController, AdmissionStatus, RetryPolicy, Retryable};
pub use validator::{ArtifactValidator, SchemaValidator, ValidationOutcome};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for log aggregators
/// - anything else (including unset): human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`GenerationError::Config`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), GenerationError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| GenerationError::Config(format!("tracing init failed: {e}")))
}

/// Every failure the generation gate surfaces to its caller.
///
/// The first five variants are the service-facing taxonomy. Only
/// [`GenerationError::Service`] is retried, and only when its `retryable`
/// flag is set; everything else propagates on the first attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// Credentials were rejected by the generation service.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote service reported that its own rate limit was hit.
    ///
    /// Distinct from local throttling, which simply waits.
    #[error("remote rate limit reached: {message}")]
    RateLimit {
        /// Message reported by the service.
        message: String,
        /// Delay suggested by the service, when it sent one.
        retry_after: Option<Duration>,
    },

    /// Input or generated output failed structural validation.
    #[error("validation failed: {}", .errors.join("; "))]
    Validation {
        /// Every problem found, in discovery order.
        errors: Vec<String>,
    },

    /// The local daily ceiling has been reached.
    #[error("daily generation quota of {daily_limit} exhausted; resets in {hours_until_reset}h")]
    QuotaExceeded {
        /// Configured requests-per-day ceiling.
        daily_limit: u32,
        /// Whole hours (rounded up) until the next calendar-day reset.
        hours_until_reset: u32,
    },

    /// Catch-all remote failure (transport, 5xx, undecodable body, …).
    #[error("service error [{code}]: {message}")]
    Service {
        /// Machine-readable failure code, e.g. `transport` or `http_error`.
        code: String,
        /// HTTP-like status, when one was observed.
        status: Option<u16>,
        /// Human-readable detail.
        message: String,
        /// Whether another attempt may succeed.
        retryable: bool,
    },

    /// A queued admission request gave up waiting for a token.
    #[error("admission wait exceeded deadline of {waited:?}")]
    AdmissionTimeout {
        /// Deadline the caller supplied.
        waited: Duration,
    },

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    /// Build a retryable [`GenerationError::Service`] without a status.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            status: None,
            message: message.into(),
            retryable: true,
        }
    }

    /// Build a [`GenerationError::Validation`] from a single message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![message.into()],
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::RateLimit { .. } => "rate_limit",
            Self::Validation { .. } => "validation",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::Service { .. } => "service",
            Self::AdmissionTimeout { .. } => "admission_timeout",
            Self::Config(_) => "config",
        }
    }
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Service {
                retryable: true,
                ..
            }
        )
    }
}
