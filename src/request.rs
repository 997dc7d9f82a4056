//! Generation requests and their local validation.
//!
//! Requests are checked before any admission token is spent, so malformed
//! input never consumes quota.

use crate::generator::GenerationPrompt;
use crate::GenerationError;
use serde::{Deserialize, Serialize};

const MAX_TOPIC_CHARS: usize = 200;
const MAX_LESSONS: u32 = 30;

/// A caller's request for one generated course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Correlation id, echoed into logs and the prompt.
    pub request_id: String,
    /// Subject of the course.
    pub topic: String,
    /// Learning track.
    pub track: String,
    /// Difficulty label.
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    /// Number of lessons wanted.
    #[serde(default = "default_lesson_count")]
    pub lesson_count: u32,
}

fn default_difficulty() -> String {
    "beginner".to_string()
}

fn default_lesson_count() -> u32 {
    10
}

impl GenerationRequest {
    /// Request with default difficulty and lesson count.
    pub fn new(
        request_id: impl Into<String>,
        topic: impl Into<String>,
        track: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            topic: topic.into(),
            track: track.into(),
            difficulty: default_difficulty(),
            lesson_count: default_lesson_count(),
        }
    }

    /// Set the lesson count.
    pub fn with_lesson_count(mut self, lesson_count: u32) -> Self {
        self.lesson_count = lesson_count;
        self
    }

    /// Set the difficulty label.
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = difficulty.into();
        self
    }

    /// Check the request locally.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Validation`] listing every problem found.
    pub fn validate(&self) -> Result<(), GenerationError> {
        let mut errors = Vec::new();

        let topic = self.topic.trim();
        if topic.is_empty() {
            errors.push("topic: must not be empty".to_string());
        } else if topic.chars().count() > MAX_TOPIC_CHARS {
            errors.push(format!("topic: must be at most {MAX_TOPIC_CHARS} characters"));
        }
        if self.track.trim().is_empty() {
            errors.push("track: must not be empty".to_string());
        }
        if !(1..=MAX_LESSONS).contains(&self.lesson_count) {
            errors.push(format!(
                "lesson_count: {} is outside 1..={MAX_LESSONS}",
                self.lesson_count
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::Validation { errors })
        }
    }

    /// Structured prompt for the remote call.
    ///
    /// `code_track` is the scoring profile's code track; requests on that
    /// track are asked for a code exercise.
    pub fn to_prompt(&self, code_track: &str) -> GenerationPrompt {
        let mut requirements = vec![
            "ground every example in the learner's local context".to_string(),
            "include at least one quiz with five or more four-option questions".to_string(),
            "state at least four concrete learning objectives".to_string(),
        ];
        if self.track.trim().eq_ignore_ascii_case(code_track.trim()) {
            requirements.push("include a tested code exercise using the platform SDK".to_string());
        }

        GenerationPrompt {
            request_id: self.request_id.clone(),
            topic: self.topic.trim().to_string(),
            track: self.track.trim().to_string(),
            difficulty: self.difficulty.clone(),
            lesson_count: self.lesson_count,
            requirements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request_passes() {
        let request = GenerationRequest::new("r1", "Sending remittances", "business");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_every_problem_reported() {
        let request = GenerationRequest::new("r1", "   ", "").with_lesson_count(0);
        match request.validate() {
            Err(GenerationError::Validation { errors }) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors[0].starts_with("topic"));
                assert!(errors[1].starts_with("track"));
                assert!(errors[2].starts_with("lesson_count"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_topic_length_limit_counts_chars() {
        let at_limit = GenerationRequest::new("r", "é".repeat(200), "business");
        assert!(at_limit.validate().is_ok());
        let over = GenerationRequest::new("r", "a".repeat(201), "business");
        assert!(over.validate().is_err());
    }

    #[test]
    fn test_lesson_count_bounds() {
        let base = GenerationRequest::new("r", "Savings", "business");
        assert!(base.clone().with_lesson_count(1).validate().is_ok());
        assert!(base.clone().with_lesson_count(30).validate().is_ok());
        assert!(base.with_lesson_count(31).validate().is_err());
    }

    #[test]
    fn test_prompt_carries_request_fields() {
        let prompt = GenerationRequest::new("r9", "  Smart contracts ", "Developer")
            .with_difficulty("intermediate")
            .to_prompt("developer");
        assert_eq!(prompt.request_id, "r9");
        assert_eq!(prompt.topic, "Smart contracts");
        assert_eq!(prompt.difficulty, "intermediate");
        assert!(prompt.requirements.iter().any(|r| r.contains("code exercise")));
    }

    #[test]
    fn test_code_exercise_follows_configured_code_track() {
        let has_code = |prompt: &GenerationPrompt| {
            prompt.requirements.iter().any(|r| r.contains("code exercise"))
        };

        let engineering = GenerationRequest::new("r", "Wallet SDK", "Engineering");
        assert!(has_code(&engineering.to_prompt("engineering")));
        assert!(!has_code(&engineering.to_prompt("developer")));

        let developer = GenerationRequest::new("r", "Wallet SDK", "developer");
        assert!(!has_code(&developer.to_prompt("engineering")));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let request: GenerationRequest = serde_json::from_str(
            r#"{"requestId":"a","topic":"Savings","track":"business"}"#,
        )
        .unwrap();
        assert_eq!(request.lesson_count, 10);
        assert_eq!(request.difficulty, "beginner");
    }
}
