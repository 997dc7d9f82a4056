//! # Stage: Artifact Validation
//!
//! ## Responsibility
//! Turn the raw JSON returned by the generation service into a typed
//! [`Course`], or explain every reason it cannot be one.
//!
//! ## Guarantees
//! - `success == true` implies `data.is_some()` and `errors.is_empty()`
//! - All structural problems are reported together, not just the first
//!
//! ## NOT Responsible For
//! - Judging content quality (see `quality`)

use crate::artifact::{Course, LessonContent};
use serde::{Deserialize, Serialize};

/// Result of validating one raw artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    /// Whether the artifact is a structurally valid course.
    pub success: bool,
    /// The decoded course when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Course>,
    /// Every structural problem found.
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn valid(course: Course) -> Self {
        Self {
            success: true,
            data: Some(course),
            errors: Vec::new(),
        }
    }

    fn invalid(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
        }
    }
}

/// Validates raw generation output.
pub trait ArtifactValidator: Send + Sync {
    /// Validate `raw`.
    fn validate(&self, raw: &serde_json::Value) -> ValidationOutcome;
}

/// Decodes the course shape with serde, then applies structural rules that
/// the type system does not capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    /// New validator.
    pub fn new() -> Self {
        Self
    }

    fn structural_errors(course: &Course) -> Vec<String> {
        let mut errors = Vec::new();
        if course.title.trim().is_empty() {
            errors.push("title: must not be empty".to_string());
        }
        if course.description.trim().is_empty() {
            errors.push("description: must not be empty".to_string());
        }
        if course.lessons.is_empty() {
            errors.push("lessons: at least one lesson required".to_string());
        }

        for (i, lesson) in course.lessons.iter().enumerate() {
            let at = format!("lessons[{i}]");
            if lesson.title.trim().is_empty() {
                errors.push(format!("{at}.title: must not be empty"));
            }
            match &lesson.content {
                LessonContent::Quiz { questions } => {
                    if questions.is_empty() {
                        errors.push(format!("{at}.questions: at least one question required"));
                    }
                    for (j, q) in questions.iter().enumerate() {
                        if q.prompt.trim().is_empty() {
                            errors.push(format!("{at}.questions[{j}].prompt: must not be empty"));
                        }
                        if q.options.is_empty() {
                            errors.push(format!("{at}.questions[{j}].options: must not be empty"));
                        }
                    }
                }
                LessonContent::HandsOn { steps, .. } if steps.is_empty() => {
                    errors.push(format!("{at}.steps: at least one step required"));
                }
                _ => {}
            }
        }
        errors
    }
}

impl ArtifactValidator for SchemaValidator {
    fn validate(&self, raw: &serde_json::Value) -> ValidationOutcome {
        let course: Course = match Course::deserialize(raw) {
            Ok(course) => course,
            Err(e) => return ValidationOutcome::invalid(vec![format!("schema: {e}")]),
        };

        let errors = Self::structural_errors(&course);
        if errors.is_empty() {
            ValidationOutcome::valid(course)
        } else {
            ValidationOutcome::invalid(errors)
        }
    }
}
