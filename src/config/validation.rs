//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`GateConfig`] that cannot be
//! expressed through the type system alone (range checks, cross-field
//! invariants).
//!
//! ## Guarantees
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value

use super::GateConfig;

/// Errors arising from configuration parsing, validation, or I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "retry.max_attempts").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: field.into(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Validate all semantic constraints on a [`GateConfig`].
///
/// # Errors
///
/// Returns every violation found.
pub fn validate(config: &GateConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Admission ────────────────────────────────────────────────────
    let admission = &config.admission;
    if admission.rate_per_minute == 0 {
        errors.push(invalid("admission.rate_per_minute", 0, "must be at least 1"));
    }
    if admission.rate_per_minute > 60_000 {
        errors.push(invalid(
            "admission.rate_per_minute",
            admission.rate_per_minute,
            "must be \u{2264} 60000 (one token per millisecond)",
        ));
    }
    if admission.daily_limit == 0 {
        errors.push(invalid("admission.daily_limit", 0, "must be at least 1"));
    }
    if admission.capacity == Some(0) {
        errors.push(invalid("admission.capacity", 0, "must be at least 1"));
    }

    // ── Retry ────────────────────────────────────────────────────────
    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(invalid("retry.max_attempts", 0, "must be at least 1"));
    }
    if retry.initial_delay_ms > retry.max_delay_ms {
        errors.push(invalid(
            "retry.initial_delay_ms",
            retry.initial_delay_ms,
            "must be \u{2264} max_delay_ms",
        ));
    }
    if retry.multiplier.is_nan() || retry.multiplier < 1.0 {
        errors.push(invalid(
            "retry.multiplier",
            retry.multiplier,
            "must be \u{2265} 1.0",
        ));
    }

    // ── Scoring ──────────────────────────────────────────────────────
    let scoring = &config.scoring;
    if scoring.pass_threshold > 100 {
        errors.push(invalid(
            "scoring.pass_threshold",
            scoring.pass_threshold,
            "must be \u{2264} 100",
        ));
    }
    let profile = &scoring.profile;
    if profile.context_keyword_sets.is_empty() {
        errors.push(invalid(
            "scoring.profile.context_keyword_sets",
            "[]",
            "at least one keyword set is required",
        ));
    }
    for (i, set) in profile.context_keyword_sets.iter().enumerate() {
        if set.keywords.is_empty() {
            errors.push(invalid(
                &format!("scoring.profile.context_keyword_sets[{i}].keywords"),
                "[]",
                "keyword set must not be empty",
            ));
        }
        if set.weight.is_nan() || set.weight <= 0.0 {
            errors.push(invalid(
                &format!("scoring.profile.context_keyword_sets[{i}].weight"),
                set.weight,
                "must be > 0",
            ));
        }
    }
    if !(0.0..=1.0).contains(&profile.max_low_effort_ratio) {
        errors.push(invalid(
            "scoring.profile.max_low_effort_ratio",
            profile.max_low_effort_ratio,
            "must be between 0.0 and 1.0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordSet;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&GateConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut cfg = GateConfig::default();
        cfg.admission.rate_per_minute = 0;
        let errors = validate(&cfg).unwrap_err();
        assert!(errors[0].to_string().contains("admission.rate_per_minute"));
    }

    #[test]
    fn test_zero_daily_limit_rejected() {
        let mut cfg = GateConfig::default();
        cfg.admission.daily_limit = 0;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut cfg = GateConfig::default();
        cfg.admission.capacity = Some(0);
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_initial_delay_above_cap_rejected() {
        let mut cfg = GateConfig::default();
        cfg.retry.initial_delay_ms = 10_000;
        let errors = validate(&cfg).unwrap_err();
        assert!(errors[0].to_string().contains("retry.initial_delay_ms"));
    }

    #[test]
    fn test_nan_multiplier_rejected() {
        let mut cfg = GateConfig::default();
        cfg.retry.multiplier = f64::NAN;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_threshold_above_100_rejected() {
        let mut cfg = GateConfig::default();
        cfg.scoring.pass_threshold = 101;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn test_empty_keyword_set_rejected() {
        let mut cfg = GateConfig::default();
        cfg.scoring.profile.context_keyword_sets.push(KeywordSet {
            name: "empty".into(),
            keywords: vec![],
            weight: 1.0,
        });
        let errors = validate(&cfg).unwrap_err();
        assert!(errors[0].to_string().contains("keywords"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut cfg = GateConfig::default();
        cfg.admission.rate_per_minute = 0;
        cfg.retry.max_attempts = 0;
        cfg.scoring.profile.context_keyword_sets.clear();
        let errors = validate(&cfg).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
