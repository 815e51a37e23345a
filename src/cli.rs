//! # Command Line
//!
//! ```bash
//! # Inspect only
//! cluster-identity-remediator --csv clusters.csv --pem identity.pem --client-id <APP_ID> --dry-run
//!
//! # Apply, tracking each update to completion, four tenants at a time
//! cluster-identity-remediator --csv clusters.csv --pem identity.pem --client-id <APP_ID> \
//!     --wait --max-parallel-tenants 4 --report report.csv
//! ```
//!
//! The camel-case spellings `--dryRun` and `--clientID` are accepted as aliases.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{BatchConfig, RuntimeConfig};

/// Normalize the managed identity of AKS clusters listed in a CSV file
#[derive(Debug, Parser)]
#[command(
    name = "cluster-identity-remediator",
    version,
    about = "Normalize the managed identity of AKS clusters listed in a CSV file",
    long_about = None,
    after_help = "\
CSV format (one cluster per row):
  /subscriptions/<sub>/resourceGroups/<rg>/providers/Microsoft.ContainerService/managedClusters/<name>,<tenant-id>

Environment:
  ARM_ENDPOINT, AUTHORITY_HOST, MANAGED_CLUSTERS_API_VERSION, REQUEST_TIMEOUT_SECS,
  OPERATION_TIMEOUT_SECS, POLL_INTERVAL_MIN_SECS, POLL_INTERVAL_MAX_SECS,
  MAX_PARALLEL_TENANTS, LOG_LEVEL, LOG_FORMAT, LOG_ENABLE_COLOR
"
)]
pub struct Cli {
    /// CSV file: resource path in column 0, tenant ID in column 1
    #[arg(long, value_name = "PATH")]
    pub csv: PathBuf,

    /// PEM file with the client certificate chain and private key
    #[arg(long, value_name = "PATH")]
    pub pem: PathBuf,

    /// Application (client) ID registered in every tenant
    #[arg(long = "client-id", alias = "clientID", value_name = "ID")]
    pub client_id: String,

    /// Inspect clusters without submitting updates
    #[arg(long = "dry-run", alias = "dryRun")]
    pub dry_run: bool,

    /// Treat the first CSV row as a header
    #[arg(long)]
    pub has_headers: bool,

    /// Track each update until it finishes
    #[arg(long)]
    pub wait: bool,

    /// Number of tenants processed concurrently (overrides MAX_PARALLEL_TENANTS)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub max_parallel_tenants: Option<u16>,

    /// Write a CSV audit report with one row per record
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Write Prometheus text-format metrics at exit
    #[arg(long, value_name = "PATH")]
    pub metrics_file: Option<PathBuf>,
}

impl Cli {
    /// Effective batch settings: CLI flags over environment defaults
    #[must_use]
    pub fn batch_config(&self, runtime: &RuntimeConfig) -> BatchConfig {
        let mut config = BatchConfig::from_runtime(runtime, self.dry_run, self.wait);
        if let Some(workers) = self.max_parallel_tenants {
            config.max_parallel_tenants = usize::from(workers);
        }
        config
    }
}
