//! # Stage: Quality Gate
//!
//! ## Responsibility
//! Run a fixed battery of independent rules over a validated [`Course`] and
//! reduce the findings to a 0–100 score plus a pass/fail verdict.
//!
//! ## Guarantees
//! - Deterministic: same course and config always produce the same report
//! - Pure: no I/O, the course is only read
//! - Bounded: the score is always an integer in `[0, 100]`
//! - A course with any error-severity issue never passes, whatever its score
//!
//! ## NOT Responsible For
//! - Structural validation of raw service output (that belongs to `validator`)
//! - Persisting courses (the caller decides based on [`QualityReport::passed`])

pub mod checks;

use crate::artifact::{Course, LessonKind};
use crate::config::ScoringConfig;
use checks::CheckOutcome;
use serde::{Deserialize, Serialize};

const LESSON_BONUS_MIN: usize = 8;
const OBJECTIVE_BONUS_MIN: usize = 6;
const LESSON_BONUS: i64 = 5;
const OBJECTIVE_BONUS: i64 = 5;
const CONTEXT_BONUS: i64 = 10;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks the course from passing.
    Error,
    /// Costs points only.
    Warning,
}

/// One finding from one check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    /// Error or warning.
    pub severity: Severity,
    /// Name of the check that raised it.
    pub check_name: String,
    /// What is wrong.
    pub message: String,
    /// How to fix it, when the check knows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Verdict of one scoring run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    /// `score >= pass_threshold` and no error-severity issue.
    pub passed: bool,
    /// Clamped score.
    pub score: u8,
    /// Issues from all checks, in check order.
    pub issues: Vec<QualityIssue>,
    /// Structural warnings not tied to a single field.
    pub warnings: Vec<String>,
    /// Applicable checks that found nothing.
    pub checks_passed: Vec<String>,
    /// Applicable checks that found something.
    pub checks_failed: Vec<String>,
}

impl QualityReport {
    /// Number of error-severity issues.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Number of warning-severity issues (structural warnings excluded).
    pub fn warning_issue_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }
}

type Check = fn(&Course, &crate::config::ScoringProfile) -> CheckOutcome;

const BATTERY: [(&str, Check); 8] = [
    (checks::CONTEXTUAL_RELEVANCE, checks::contextual_relevance),
    (checks::CONTENT_BALANCE, checks::content_balance),
    (checks::ASSESSMENT_QUALITY, checks::assessment_quality),
    (checks::CODE_EXERCISES, checks::code_exercises),
    (checks::HANDS_ON_EXERCISES, checks::hands_on_exercises),
    (checks::SAFETY_WARNING, checks::safety_warning),
    (checks::LEARNING_OBJECTIVES, checks::learning_objectives),
    (checks::TITLE_DESCRIPTION, checks::title_description),
];

/// Stateless scorer; safe to share across tasks.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    config: ScoringConfig,
}

impl QualityScorer {
    /// Scorer using `config` for thresholds, penalties and rule data.
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score `course`.
    pub fn score(&self, course: &Course) -> QualityReport {
        let profile = &self.config.profile;
        let mut issues = Vec::new();
        let mut warnings = Vec::new();
        let mut checks_passed = Vec::new();
        let mut checks_failed = Vec::new();

        for (name, check) in BATTERY {
            let outcome = check(course, profile);
            if !outcome.applicable {
                continue;
            }
            if outcome.is_clean() {
                checks_passed.push(name.to_string());
            } else {
                checks_failed.push(name.to_string());
            }
            issues.extend(outcome.issues);
            warnings.extend(outcome.warnings);
        }

        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count() as i64;
        let warning_issues = issues.len() as i64 - errors;

        let mut score = 100_i64;
        score -= errors * i64::from(self.config.error_penalty);
        score -= warning_issues * i64::from(self.config.warning_penalty);
        score -= warnings.len() as i64 * i64::from(self.config.structural_warning_penalty);

        if course.lessons.len() >= LESSON_BONUS_MIN {
            score += LESSON_BONUS;
        }
        if course.objectives.len() >= OBJECTIVE_BONUS_MIN {
            score += OBJECTIVE_BONUS;
        }
        let hits = checks::context_hits(&course.text_corpus(), profile);
        if hits.weighted >= profile.context_bonus_hits {
            score += CONTEXT_BONUS;
        }

        let score = score.clamp(0, 100) as u8;
        let passed = u32::from(score) >= self.config.pass_threshold && errors == 0;

        QualityReport {
            passed,
            score,
            issues,
            warnings,
            checks_passed,
            checks_failed,
        }
    }
}

/// Count of lessons by kind, for log fields.
pub fn lesson_mix(course: &Course) -> [(LessonKind, usize); 5] {
    [
        LessonKind::Reading,
        LessonKind::Video,
        LessonKind::Quiz,
        LessonKind::HandsOn,
        LessonKind::CodeExercise,
    ]
    .map(|kind| (kind, course.count_kind(kind)))
}
