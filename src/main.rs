//! Demo binary for course-generation-gate
//!
//! Runs one generation request through the gate and prints the outcome as
//! JSON. `course-generation-gate schema` prints the configuration JSON Schema
//! instead.
//!
//! ## Environment Variables
//!
//! - `GATE_CONFIG`: path to a TOML config file (defaults apply when unset)
//! - `GENERATOR_URL`: remote generation endpoint; a built-in sample course
//!   is used when unset
//! - `GENERATOR_API_KEY`: bearer token for `GENERATOR_URL`
//! - `LOG_FORMAT=json`: structured JSON output (production)
//! - `RUST_LOG=info`: log level filter

use course_generation_gate::config::{self, loader, GateConfig};
use course_generation_gate::{
    init_tracing, metrics, ContentGenerator, GenerationGate, GenerationRequest, HttpGenerator,
    SchemaValidator, StaticGenerator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const SAMPLE_COURSE: &str = include_str!("../fixtures/sample_course.json");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().nth(1).as_deref() == Some("schema") {
        println!("{}", config::export_schema()?);
        return Ok(());
    }

    let _ = init_tracing();
    metrics::init_metrics()?;

    let config = match std::env::var("GATE_CONFIG") {
        Ok(path) => loader::load_from_file(&PathBuf::from(path))?,
        Err(_) => GateConfig::default(),
    };

    let generator: Arc<dyn ContentGenerator> = match std::env::var("GENERATOR_URL") {
        Ok(url) => {
            let key = std::env::var("GENERATOR_API_KEY").unwrap_or_default();
            info!(endpoint = %url, "using remote generator");
            Arc::new(HttpGenerator::new(url, key)?)
        }
        Err(_) => {
            info!("GENERATOR_URL not set, using built-in sample course");
            Arc::new(StaticGenerator::new(serde_json::from_str(SAMPLE_COURSE)?))
        }
    };

    let gate = GenerationGate::new(&config, generator, Arc::new(SchemaValidator::new()));
    gate.start()?;

    let request = GenerationRequest::new("demo-req-001", "Cross-border mobile payments", "business");
    let result = gate.generate(&request).await;
    gate.stop();

    let outcome = result?;
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    info!(
        status = %serde_json::to_string(&gate.status())?,
        "admission after run"
    );

    let summary = metrics::get_metrics_summary();
    info!(
        admissions = ?summary.admissions,
        retries = summary.retries,
        errors = ?summary.errors,
        "metrics summary"
    );

    if !outcome.report.passed {
        std::process::exit(2);
    }
    Ok(())
}
