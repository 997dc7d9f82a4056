//! Prometheus metrics for the generation gate.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_admission`, `inc_retry`, …) are no-ops if `init_metrics` was never
//! called, so the gate is always safe to run and observability simply
//! degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `gate_admissions_total` | Counter | `outcome` |
//! | `gate_retries_total` | Counter | |
//! | `gate_errors_total` | Counter | `stage`, `err_type` |
//! | `gate_quality_score` | Histogram | |
//! | `gate_stage_duration_seconds` | Histogram | `stage` |
//! | `gate_admission_queue_depth` | Gauge | |

use crate::GenerationError;
use prometheus::{
    core::Collector, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All Prometheus metrics for the gate, bundled together so they can be
/// stored in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Admission decisions by outcome (granted, queued, quota_exceeded, timeout).
    pub admissions_total: CounterVec,
    /// Backoff sleeps taken by the retry policy.
    pub retries_total: IntCounter,
    /// Errors by stage and error kind.
    pub errors_total: CounterVec,
    /// Distribution of quality scores.
    pub quality_score: Histogram,
    /// Stage latency histogram.
    pub stage_duration: HistogramVec,
    /// Callers currently waiting for an admission token.
    pub queue_depth: IntGauge,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn register<C>(registry: &Registry, collector: Result<C, prometheus::Error>) -> Result<C, GenerationError>
where
    C: Collector + Clone + 'static,
{
    let collector =
        collector.map_err(|e| GenerationError::Config(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|e| GenerationError::Config(format!("metrics registration failed: {e}")))?;
    Ok(collector)
}

fn build(registry: Registry, prefix: &str) -> Result<Metrics, GenerationError> {
    let admissions_total = register(
        &registry,
        CounterVec::new(
            Opts::new(format!("{prefix}_admissions_total"), "Admission decisions"),
            &["outcome"],
        ),
    )?;
    let retries_total = register(
        &registry,
        IntCounter::new(
            format!("{prefix}_retries_total"),
            "Retry backoffs before re-calling the generation service",
        ),
    )?;
    let errors_total = register(
        &registry,
        CounterVec::new(
            Opts::new(format!("{prefix}_errors_total"), "Errors by stage and kind"),
            &["stage", "err_type"],
        ),
    )?;
    let quality_score = register(
        &registry,
        Histogram::with_opts(
            HistogramOpts::new(format!("{prefix}_quality_score"), "Quality scores")
                .buckets(vec![20.0, 40.0, 60.0, 70.0, 80.0, 90.0, 100.0]),
        ),
    )?;
    let stage_duration = register(
        &registry,
        HistogramVec::new(
            HistogramOpts::new(
                format!("{prefix}_stage_duration_seconds"),
                "Processing duration per stage",
            ),
            &["stage"],
        ),
    )?;
    let queue_depth = register(
        &registry,
        IntGauge::new(
            format!("{prefix}_admission_queue_depth"),
            "Callers waiting for an admission token",
        ),
    )?;

    Ok(Metrics {
        registry,
        admissions_total,
        retries_total,
        errors_total,
        quality_score,
        stage_duration,
        queue_depth,
    })
}

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all metrics in a private registry. A second call is a no-op.
///
/// # Errors
///
/// Returns [`GenerationError::Config`] if metric construction or registration
/// fails.
pub fn init_metrics() -> Result<(), GenerationError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let metrics = build(Registry::new(), "gate")?;

    // If another thread raced us, the first one wins; both bundles are identical.
    let _ = METRICS.set(metrics);

    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one admission decision.
pub fn inc_admission(outcome: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.admissions_total.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Count one retry backoff.
pub fn inc_retry() {
    if let Some(m) = metrics() {
        m.retries_total.inc();
    }
}

/// Count an error for a stage.
pub fn inc_error(stage: &str, err_type: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .errors_total
            .get_metric_with_label_values(&[stage, err_type])
        {
            c.inc();
        }
    }
}

/// Record one quality score.
pub fn observe_quality_score(score: u8) {
    if let Some(m) = metrics() {
        m.quality_score.observe(f64::from(score));
    }
}

/// Record the latency of a gate stage.
pub fn record_stage_latency(stage: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.stage_duration.get_metric_with_label_values(&[stage]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Set the admission queue depth gauge.
pub fn set_admission_queue_depth(depth: usize) {
    if let Some(m) = metrics() {
        m.queue_depth.set(i64::try_from(depth).unwrap_or(i64::MAX));
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or encoding
/// fails.
pub fn gather_metrics() -> String {
    let Some(m) = metrics() else {
        return String::new();
    };
    let families = m.registry.gather();
    let mut buffer = Vec::new();
    if TextEncoder::new().encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// A structured snapshot of the counters.
#[derive(Debug, Default)]
pub struct MetricsSummary {
    /// Admission decisions keyed by outcome.
    pub admissions: HashMap<String, u64>,
    /// Retry backoffs taken.
    pub retries: u64,
    /// Error counts keyed by `"stage:err_type"`.
    pub errors: HashMap<String, u64>,
}

fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> &'a str {
    metric
        .get_label()
        .iter()
        .find(|l| l.get_name() == name)
        .map_or("unknown", |l| l.get_value())
}

fn summarize(m: &Metrics) -> MetricsSummary {
    let mut summary = MetricsSummary {
        retries: m.retries_total.get(),
        ..MetricsSummary::default()
    };

    for family in m.admissions_total.collect() {
        for metric in family.get_metric() {
            let value = metric.get_counter().get_value() as u64;
            summary
                .admissions
                .insert(label(metric, "outcome").to_string(), value);
        }
    }

    for family in m.errors_total.collect() {
        for metric in family.get_metric() {
            let key = format!("{}:{}", label(metric, "stage"), label(metric, "err_type"));
            summary
                .errors
                .insert(key, metric.get_counter().get_value() as u64);
        }
    }

    summary
}

/// Current counter values. Zeroed if metrics have not been initialised.
pub fn get_metrics_summary() -> MetricsSummary {
    metrics().map(summarize).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// We cannot reset the global `METRICS` OnceLock between tests, so tests
    /// that need exact counter values build a local bundle instead.
    fn make_test_metrics() -> Metrics {
        build(Registry::new(), "t").expect("test: build metrics")
    }

    #[test]
    fn test_init_metrics_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok(), "second call must be a no-op");
    }

    #[test]
    fn test_helpers_before_or_after_init_do_not_panic() {
        inc_admission("granted");
        inc_retry();
        inc_error("generate", "service");
        observe_quality_score(80);
        record_stage_latency("score", Duration::from_millis(2));
        set_admission_queue_depth(3);
    }

    #[test]
    fn test_summary_reads_isolated_counters() {
        let m = make_test_metrics();
        m.admissions_total
            .get_metric_with_label_values(&["granted"])
            .expect("label ok")
            .inc_by(2.0);
        m.admissions_total
            .get_metric_with_label_values(&["quota_exceeded"])
            .expect("label ok")
            .inc();
        m.retries_total.inc();
        m.errors_total
            .get_metric_with_label_values(&["generate", "authentication"])
            .expect("label ok")
            .inc();

        let summary = summarize(&m);
        assert_eq!(summary.admissions.get("granted"), Some(&2));
        assert_eq!(summary.admissions.get("quota_exceeded"), Some(&1));
        assert_eq!(summary.retries, 1);
        assert_eq!(summary.errors.get("generate:authentication"), Some(&1));
    }

    #[test]
    fn test_quality_histogram_records_observation() {
        let m = make_test_metrics();
        m.quality_score.observe(85.0);
        let families = m.registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "t_quality_score")
            .expect("histogram family must be present");
        assert_eq!(family.get_metric()[0].get_histogram().get_sample_count(), 1);
    }

    #[test]
    fn test_gather_metrics_contains_gate_prefix_after_observation() {
        let _ = init_metrics();
        inc_admission("granted");
        assert!(gather_metrics().contains("gate_admissions_total"));
    }
}
