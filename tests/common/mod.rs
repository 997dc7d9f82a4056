//! Shared fixtures for integration tests.

#![allow(dead_code)]

use course_generation_gate::config::{AdmissionConfig, GateConfig, RetryConfig};
use course_generation_gate::{Course, GenerationRequest};

pub const SAMPLE_COURSE: &str = include_str!("../../fixtures/sample_course.json");

/// The sample course as raw service output. Scores 100 and passes.
pub fn sample_json() -> serde_json::Value {
    serde_json::from_str(SAMPLE_COURSE).expect("fixture parses")
}

/// The sample course, typed.
pub fn sample_course() -> Course {
    serde_json::from_value(sample_json()).expect("fixture is a course")
}

/// The sample course with every contextual keyword removed from the title
/// and description. Lessons and objectives already contain none.
pub fn context_free_course() -> Course {
    Course {
        title: "Phone Payments Intro".into(),
        description: "Learn how shop owners in small towns use phone apps to move local money across borders, with worked examples on a public payment ledger for everyone.".into(),
        ..sample_course()
    }
}

pub fn request(id: &str) -> GenerationRequest {
    GenerationRequest::new(id, "Cross-border mobile payments", "business")
}

/// Defaults with millisecond backoff so real-time tests stay fast.
pub fn fast_retry_config() -> GateConfig {
    GateConfig {
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 5,
            max_delay_ms: 20,
            multiplier: 2.0,
        },
        ..GateConfig::default()
    }
}

pub fn admission(rate_per_minute: u32, daily_limit: u32, capacity: Option<u32>) -> AdmissionConfig {
    AdmissionConfig {
        rate_per_minute,
        daily_limit,
        capacity,
    }
}
