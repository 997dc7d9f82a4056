//! # Gate Configuration
//!
//! ## Responsibility
//! Parse and validate the TOML file that tunes admission control, retry
//! backoff and the quality scoring policy.
//!
//! ## Guarantees
//! - Every field has a documented default, so an empty file is a valid config
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building runtime components from config (that belongs to `gate`)
//! - Evaluating rules against a course (that belongs to `quality`)

pub mod loader;
pub mod validation;

use crate::artifact::LessonKind;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Default value functions ──────────────────────────────────────────────

fn default_rate_per_minute() -> u32 {
    15
}

fn default_daily_limit() -> u32 {
    1500
}

fn default_max_attempts() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_pass_threshold() -> u32 {
    60
}

fn default_error_penalty() -> u32 {
    15
}

fn default_warning_penalty() -> u32 {
    5
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a generation gate.
///
/// # Example
///
/// ```toml
/// [admission]
/// rate_per_minute = 15
/// daily_limit = 1500
///
/// [retry]
/// max_attempts = 3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GateConfig {
    /// Token bucket and daily quota.
    #[serde(default)]
    pub admission: AdmissionConfig,
    /// Backoff for remote generation calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Quality gate policy and rule data.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

// ── Admission ────────────────────────────────────────────────────────────

/// Token bucket parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct AdmissionConfig {
    /// Tokens refilled per minute (one every `60 / rate_per_minute` seconds).
    #[serde(default = "default_rate_per_minute")]
    pub rate_per_minute: u32,
    /// Hard ceiling of admitted requests per calendar day (UTC).
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Bucket size. `None` uses `rate_per_minute`.
    #[serde(default)]
    pub capacity: Option<u32>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            rate_per_minute: default_rate_per_minute(),
            daily_limit: default_daily_limit(),
            capacity: None,
        }
    }
}

impl AdmissionConfig {
    /// Effective bucket size.
    pub fn effective_capacity(&self) -> u32 {
        self.capacity.unwrap_or(self.rate_per_minute)
    }

    /// Period between refill ticks. Zero rates are rejected by validation;
    /// here they clamp to one per minute.
    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.rate_per_minute.max(1)))
    }
}

// ── Retry ────────────────────────────────────────────────────────────────

/// Exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Delay before the second attempt.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Backoff cap. Must be ≥ `initial_delay_ms`.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
        }
    }
}

// ── Scoring ──────────────────────────────────────────────────────────────

/// Pass threshold, penalty weights and rule data.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ScoringConfig {
    /// Minimum score for a course to pass (error-free courses only).
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: u32,
    /// Points deducted per error-severity issue.
    #[serde(default = "default_error_penalty")]
    pub error_penalty: u32,
    /// Points deducted per warning-severity issue.
    #[serde(default = "default_warning_penalty")]
    pub warning_penalty: u32,
    /// Points deducted per structural warning (the report's `warnings` list).
    #[serde(default = "default_warning_penalty")]
    pub structural_warning_penalty: u32,
    /// Keyword data and thresholds consulted by the checks.
    #[serde(default)]
    pub profile: ScoringProfile,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            pass_threshold: default_pass_threshold(),
            error_penalty: default_error_penalty(),
            warning_penalty: default_warning_penalty(),
            structural_warning_penalty: default_warning_penalty(),
            profile: ScoringProfile::default(),
        }
    }
}

/// A named group of contextual keywords.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct KeywordSet {
    /// Category name, e.g. `"places"`.
    pub name: String,
    /// Lowercase keywords.
    pub keywords: Vec<String>,
    /// Multiplier applied to hits when computing the relevance bonus.
    #[serde(default = "default_keyword_weight")]
    pub weight: f64,
}

fn default_keyword_weight() -> f64 {
    1.0
}

/// Rule data consulted by the quality checks.
///
/// Matching is case-insensitive: keywords are compared against the
/// lowercased course text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ScoringProfile {
    /// Keyword categories for the contextual relevance check.
    pub context_keyword_sets: Vec<KeywordSet>,
    /// Distinct keyword matches below which relevance is only a warning.
    pub min_context_matches: usize,
    /// Weighted hits needed for the relevance bonus.
    pub context_bonus_hits: f64,
    /// Lesson kind treated as low-effort for the balance check.
    pub low_effort_kind: LessonKind,
    /// Share of low-effort lessons above which a warning is raised.
    pub max_low_effort_ratio: f64,
    /// Track that must contain code exercises.
    pub code_track: String,
    /// Strings a code exercise must reference (any one suffices).
    pub sdk_markers: Vec<String>,
    /// Strings starter code must contain to guide the learner (any one suffices).
    pub guidance_markers: Vec<String>,
    /// Minimum length of a hands-on completion message.
    pub min_completion_message_len: usize,
    /// Title/description keywords that make a course safety-sensitive.
    pub safety_trigger_keywords: Vec<String>,
    /// Keywords that count as a risk warning.
    pub risk_warning_keywords: Vec<String>,
    /// Tokens that mark unfinished text.
    pub placeholder_tokens: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ScoringProfile {
    fn default() -> Self {
        Self {
            context_keyword_sets: vec![
                KeywordSet {
                    name: "places".into(),
                    keywords: strings(&[
                        "nigeria", "lagos", "abuja", "kenya", "nairobi", "ghana", "accra",
                        "africa", "african",
                    ]),
                    weight: 1.0,
                },
                KeywordSet {
                    name: "currency".into(),
                    keywords: strings(&[
                        "naira", "cedi", "shilling", "mobile money", "m-pesa", "remittance",
                    ]),
                    weight: 1.5,
                },
                KeywordSet {
                    name: "ecosystem".into(),
                    keywords: strings(&[
                        "stellar", "soroban", "stablecoin", "usdc", "anchor", "wallet",
                    ]),
                    weight: 1.0,
                },
            ],
            min_context_matches: 3,
            context_bonus_hits: 5.0,
            low_effort_kind: LessonKind::Reading,
            max_low_effort_ratio: 0.7,
            code_track: "developer".into(),
            sdk_markers: strings(&["soroban_sdk", "stellar_sdk", "#[contract]"]),
            guidance_markers: strings(&["todo", "your code here", "implement"]),
            min_completion_message_len: 30,
            safety_trigger_keywords: strings(&[
                "trading",
                "investment",
                "investing",
                "crypto",
                "defi",
                "yield",
            ]),
            risk_warning_keywords: strings(&[
                "risk",
                "volatile",
                "volatility",
                "not financial advice",
                "lose money",
                "scam",
            ]),
            placeholder_tokens: strings(&["tbd", "todo", "xxx", "placeholder", "lorem ipsum"]),
        }
    }
}

/// Export the JSON Schema for [`GateConfig`].
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(GateConfig);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_defaults_match_service_quota() {
        let cfg = AdmissionConfig::default();
        assert_eq!(cfg.rate_per_minute, 15);
        assert_eq!(cfg.daily_limit, 1500);
        assert_eq!(cfg.effective_capacity(), 15);
        assert_eq!(cfg.refill_interval(), Duration::from_millis(4000));
    }

    #[test]
    fn test_explicit_capacity_overrides_rate() {
        let cfg = AdmissionConfig {
            capacity: Some(3),
            ..AdmissionConfig::default()
        };
        assert_eq!(cfg.effective_capacity(), 3);
    }

    #[test]
    fn test_retry_defaults() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.initial_delay_ms, 1000);
        assert_eq!(cfg.max_delay_ms, 5000);
    }

    #[test]
    fn test_scoring_defaults_reproduce_flat_penalties() {
        let cfg = ScoringConfig::default();
        assert_eq!(cfg.pass_threshold, 60);
        assert_eq!(cfg.error_penalty, 15);
        assert_eq!(cfg.warning_penalty, 5);
        assert_eq!(cfg.structural_warning_penalty, 5);
    }

    #[test]
    fn test_default_placeholders_cover_common_tokens() {
        let profile = ScoringProfile::default();
        for token in ["tbd", "todo", "xxx", "placeholder", "lorem ipsum"] {
            assert!(profile.placeholder_tokens.iter().any(|t| t == token));
        }
    }

    #[test]
    fn test_lesson_kind_deserializes_from_snake_case() {
        let kind: LessonKind =
            serde_json::from_str("\"code_exercise\"").expect("test: deserialization");
        assert_eq!(kind, LessonKind::CodeExercise);
    }

    #[test]
    fn test_export_schema_produces_valid_json() {
        let schema = export_schema().expect("test: schema export");
        let parsed: serde_json::Value =
            serde_json::from_str(&schema).expect("test: schema is valid JSON");
        assert!(parsed.get("properties").is_some() || parsed.get("$ref").is_some());
    }
}
