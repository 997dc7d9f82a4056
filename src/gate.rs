//! # Generation Gate
//!
//! ## Responsibility
//! Run one generation request end to end:
//!
//! ```text
//! validate request → acquire token → generate (with retry)
//!     → validate artifact → score → (Course, QualityReport)
//! ```
//!
//! ## Guarantees
//! - Malformed requests are rejected before a token is spent
//! - A token, once taken, is never refunded, even if the artifact is invalid
//! - Every failure is propagated unchanged; the gate adds no interpretation
//! - Each stage records its latency, and its error kind on failure
//!
//! ## NOT Responsible For
//! - Persisting courses: the caller checks [`QualityReport::passed`]
//!
//! ## Stage Names (metrics `stage` label)
//!
//! | Stage | Work |
//! |-------|------|
//! | `request` | Local request validation |
//! | `admission` | Waiting for a token |
//! | `generate` | Remote call, including retries |
//! | `validate` | Structural artifact validation |
//! | `score` | Quality scoring |

use crate::artifact::Course;
use crate::config::GateConfig;
use crate::generator::ContentGenerator;
use crate::quality::{self, QualityReport, QualityScorer};
use crate::request::GenerationRequest;
use crate::resilience::{AdmissionController, AdmissionStatus, RetryPolicy};
use crate::validator::ArtifactValidator;
use crate::{metrics, GenerationError};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn, Instrument};

/// A validated course and its quality verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    /// The generated course.
    pub course: Course,
    /// Quality verdict; persist only if `report.passed`.
    pub report: QualityReport,
}

/// Admission, retry, validation and scoring around a [`ContentGenerator`].
pub struct GenerationGate {
    admission: Arc<AdmissionController>,
    retry: RetryPolicy,
    scorer: QualityScorer,
    generator: Arc<dyn ContentGenerator>,
    validator: Arc<dyn ArtifactValidator>,
}

impl GenerationGate {
    /// Build a gate whose limiter, retry policy and scorer come from `config`.
    ///
    /// The refill timer is not running until [`start`](Self::start).
    pub fn new(
        config: &GateConfig,
        generator: Arc<dyn ContentGenerator>,
        validator: Arc<dyn ArtifactValidator>,
    ) -> Self {
        Self {
            admission: Arc::new(AdmissionController::new(&config.admission)),
            retry: RetryPolicy::from_config(&config.retry),
            scorer: QualityScorer::new(config.scoring.clone()),
            generator,
            validator,
        }
    }

    /// Use an existing limiter, e.g. one shared with other gates for the
    /// same upstream credential.
    pub fn with_admission(mut self, admission: Arc<AdmissionController>) -> Self {
        self.admission = admission;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The limiter in front of the generator.
    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    /// Start the admission refill timer.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Config`] when called outside a Tokio runtime.
    pub fn start(&self) -> Result<(), GenerationError> {
        self.admission.start()
    }

    /// Stop the admission refill timer.
    pub fn stop(&self) {
        self.admission.stop();
    }

    /// Admission snapshot.
    pub fn status(&self) -> AdmissionStatus {
        self.admission.status()
    }

    /// Rough wait before a new request would be admitted.
    pub fn estimated_wait(&self) -> Duration {
        self.admission.estimated_wait()
    }

    /// Generate, validate and score one course, waiting as long as needed
    /// for admission.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`] raised by a stage, unchanged.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.run(request, None).await
    }

    /// As [`generate`](Self::generate), but gives up with
    /// [`GenerationError::AdmissionTimeout`] if no token is granted within
    /// `deadline`.
    ///
    /// # Errors
    ///
    /// Any [`GenerationError`] raised by a stage, unchanged.
    pub async fn generate_with_deadline(
        &self,
        request: &GenerationRequest,
        deadline: Duration,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.run(request, Some(deadline)).await
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        deadline: Option<Duration>,
    ) -> Result<GenerationOutcome, GenerationError> {
        let span = tracing::info_span!(
            "gate.generate",
            request_id = %request.request_id,
            track = %request.track,
        );
        self.run_stages(request, deadline).instrument(span).await
    }

    async fn run_stages(
        &self,
        request: &GenerationRequest,
        deadline: Option<Duration>,
    ) -> Result<GenerationOutcome, GenerationError> {
        let total = Instant::now();

        stage("request", || request.validate())?;

        let start = Instant::now();
        let admitted = match deadline {
            Some(d) => self.admission.acquire_with_deadline(d).await,
            None => self.admission.acquire().await,
        };
        finish("admission", start, admitted)?;

        // NOTE: topic text is not logged
        let prompt = request.to_prompt(&self.scorer.config().profile.code_track);
        let start = Instant::now();
        let raw = self
            .retry
            .call_with_retry(|| self.generator.generate(&prompt))
            .await;
        let raw = finish("generate", start, raw)?;

        let course = stage("validate", || {
            let outcome = self.validator.validate(&raw);
            match outcome.data {
                Some(course) if outcome.success => Ok(course),
                _ => {
                    let mut errors = outcome.errors;
                    if errors.is_empty() {
                        errors.push("validator returned no course and no errors".to_string());
                    }
                    Err(GenerationError::Validation { errors })
                }
            }
        })?;

        let start = Instant::now();
        let report = self.scorer.score(&course);
        metrics::record_stage_latency("score", start.elapsed());
        metrics::observe_quality_score(report.score);

        let mix: Vec<String> = quality::lesson_mix(&course)
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(kind, n)| format!("{kind:?}={n}"))
            .collect();
        info!(
            score = report.score,
            passed = report.passed,
            errors = report.error_count(),
            issues = report.issues.len(),
            warnings = report.warnings.len(),
            lessons = %mix.join(","),
            duration_ms = total.elapsed().as_millis() as u64,
            "gate: course scored"
        );

        Ok(GenerationOutcome { course, report })
    }
}

fn stage<T>(
    name: &'static str,
    f: impl FnOnce() -> Result<T, GenerationError>,
) -> Result<T, GenerationError> {
    let start = Instant::now();
    finish(name, start, f())
}

fn finish<T>(
    name: &'static str,
    start: Instant,
    result: Result<T, GenerationError>,
) -> Result<T, GenerationError> {
    let elapsed = start.elapsed();
    metrics::record_stage_latency(name, elapsed);
    if let Err(e) = &result {
        metrics::inc_error(name, e.kind());
        warn!(
            stage = name,
            error_kind = e.kind(),
            error = %e,
            duration_ms = elapsed.as_millis() as u64,
            "gate: stage failed"
        );
    }
    result
}
