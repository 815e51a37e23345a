//! # Metrics
//!
//! Prometheus metrics for a remediation run.
//!
//! ## Metrics Exposed
//!
//! - `cluster_remediation_records_total{outcome}` - Records processed, by outcome label
//! - `cluster_remediation_credential_builds_total` - Tenant credentials constructed
//! - `cluster_remediation_arm_requests_total{operation,result}` - Resource manager requests
//! - `cluster_remediation_arm_request_duration_seconds{operation}` - Resource manager request latency
//!
//! The run is a one-shot batch, so metrics are rendered in the text exposition
//! format at the end of the run instead of being scraped.

use anyhow::{Context, Result};
use prometheus::{Encoder, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::path::Path;
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECORDS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cluster_remediation_records_total",
            "Total number of input records processed, by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create RECORDS_TOTAL metric - this should never happen")
});

static CREDENTIAL_BUILDS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cluster_remediation_credential_builds_total",
        "Total number of tenant credentials constructed",
    )
    .expect("Failed to create CREDENTIAL_BUILDS_TOTAL metric - this should never happen")
});

static ARM_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cluster_remediation_arm_requests_total",
            "Total number of Azure Resource Manager requests",
        ),
        &["operation", "result"],
    )
    .expect("Failed to create ARM_REQUESTS_TOTAL metric - this should never happen")
});

static ARM_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cluster_remediation_arm_request_duration_seconds",
            "Duration of Azure Resource Manager requests in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .expect("Failed to create ARM_REQUEST_DURATION metric - this should never happen")
});

/// Register all metrics with the registry
///
/// Calling this more than once is harmless.
///
/// # Errors
///
/// Returns an error if a metric collides with a different registered one.
pub fn register_metrics() -> Result<()> {
    register(Box::new(RECORDS_TOTAL.clone()))?;
    register(Box::new(CREDENTIAL_BUILDS_TOTAL.clone()))?;
    register(Box::new(ARM_REQUESTS_TOTAL.clone()))?;
    register(Box::new(ARM_REQUEST_DURATION.clone()))?;

    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn increment_records(outcome: &str) {
    RECORDS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_credential_builds() {
    CREDENTIAL_BUILDS_TOTAL.inc();
}

/// Record one resource manager request
pub fn record_arm_request(operation: &str, success: bool, duration: f64) {
    let result = if success { "success" } else { "error" };
    ARM_REQUESTS_TOTAL
        .with_label_values(&[operation, result])
        .inc();
    ARM_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

/// Render the registry in the Prometheus text exposition format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn render() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

/// Write the rendered metrics to `path`
///
/// # Errors
///
/// Returns an error if rendering or writing fails.
pub fn write_to_file(path: &Path) -> Result<()> {
    let rendered = render()?;
    std::fs::write(path, rendered)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}
