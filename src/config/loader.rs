//! Configuration file loading.
//!
//! ## Responsibility
//! Read a TOML file from disk, parse it into a [`GateConfig`], and run
//! validation before returning.
//!
//! ## Guarantees
//! - A successfully loaded config is always validated
//! - I/O errors and parse errors are distinguished in the error type
//! - File path is included in every error message

use std::path::Path;

use super::validation::{self, ConfigError};
use super::GateConfig;

/// Load a [`GateConfig`] from a TOML file.
///
/// # Errors
///
/// - `ConfigError::Io` if the file cannot be read.
/// - `ConfigError::Parse` if the TOML is malformed.
/// - `ConfigError::Validation` if semantic constraints are violated.
pub fn load_from_file(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        file: path.display().to_string(),
        source: e,
    })?;

    load_from_str(&content, &path.display().to_string())
}

/// Load a [`GateConfig`] from a TOML string.
///
/// `source_name` identifies the source in error messages.
///
/// # Errors
///
/// - `ConfigError::Parse` if the TOML is malformed.
/// - `ConfigError::Validation` if semantic constraints are violated.
pub fn load_from_str(content: &str, source_name: &str) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        file: source_name.to_string(),
        source: e,
    })?;

    validation::validate(&config).map_err(|errors| {
        ConfigError::Validation(
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        )
    })?;

    tracing::debug!(
        source = source_name,
        rate_per_minute = config.admission.rate_per_minute,
        daily_limit = config.admission.daily_limit,
        "gate config loaded"
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::LessonKind;
    use std::io::Write;

    const VALID_TOML: &str = r#"
[admission]
rate_per_minute = 30
daily_limit = 200
capacity = 10

[retry]
max_attempts = 4
initial_delay_ms = 500
max_delay_ms = 4000

[scoring]
pass_threshold = 70
warning_penalty = 3

[scoring.profile]
low_effort_kind = "video"
code_track = "engineering"

[[scoring.profile.context_keyword_sets]]
name = "cities"
keywords = ["lagos", "nairobi"]
weight = 2.0
"#;

    #[test]
    fn test_load_from_str_valid_toml_succeeds() {
        let config = load_from_str(VALID_TOML, "test").expect("test: valid config");
        assert_eq!(config.admission.rate_per_minute, 30);
        assert_eq!(config.admission.effective_capacity(), 10);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.scoring.pass_threshold, 70);
        assert_eq!(config.scoring.warning_penalty, 3);
        assert_eq!(config.scoring.error_penalty, 15);
        assert_eq!(config.scoring.profile.low_effort_kind, LessonKind::Video);
        assert_eq!(config.scoring.profile.code_track, "engineering");
        assert_eq!(config.scoring.profile.context_keyword_sets.len(), 1);
        // unspecified profile fields keep their defaults
        assert!(!config.scoring.profile.placeholder_tokens.is_empty());
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = load_from_str("", "empty.toml").expect("test: empty config");
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn test_load_from_str_invalid_toml_returns_parse_error() {
        let err = load_from_str("not valid toml [[[", "bad.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_load_from_str_validation_failure_returns_validation_error() {
        let err = load_from_str("[admission]\nrate_per_minute = 0\n", "zero.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_load_from_file_valid_toml_succeeds() {
        let dir = tempfile::tempdir().expect("test: create tempdir");
        let path = dir.path().join("gate.toml");
        let mut f = std::fs::File::create(&path).expect("test: create file");
        f.write_all(VALID_TOML.as_bytes()).expect("test: write");
        drop(f);

        let config = load_from_file(&path).expect("test: load file");
        assert_eq!(config.admission.daily_limit, 200);
    }

    #[test]
    fn test_load_from_file_missing_returns_io_error() {
        let err = load_from_file(Path::new("/nonexistent/gate.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
