//! # Observability
//!
//! - `logging`: tracing subscriber setup
//! - `metrics`: Prometheus counters and histograms for the run

pub mod logging;
pub mod metrics;
