//! # Cluster Identity Remediator
//!
//! Reads `(resource path, tenant)` records from a CSV file and normalizes the
//! managed identity of each listed AKS cluster, authenticating per tenant with
//! a client certificate.
//!
//! Setup failures (unreadable certificate or CSV, invalid configuration) abort
//! the run. Per-record failures are reported and the run continues.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cluster_identity_remediator::cli::Cli;
use cluster_identity_remediator::config::RuntimeConfig;
use cluster_identity_remediator::controller::{BatchRunner, ClusterReconciler};
use cluster_identity_remediator::input::load_records;
use cluster_identity_remediator::observability::{logging, metrics};
use cluster_identity_remediator::provider::azure::{
    ArmClientConfig, AzureClusterClientFactory, AzureCredentialProvider, ClientCertificate,
};
use cluster_identity_remediator::provider::CertificateIdentity;
use cluster_identity_remediator::report::{self, Summary};

#[tokio::main]
async fn main() -> Result<()> {
    // Configure rustls crypto provider before any TLS client is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    let runtime = RuntimeConfig::from_env();
    logging::init_tracing(&runtime)?;
    metrics::register_metrics()?;

    info!(
        "Starting cluster-identity-remediator {} (git {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH"),
        env!("BUILD_DATETIME")
    );

    let batch = cli.batch_config(&runtime);
    println!("Dry Run: {}", batch.dry_run);
    println!("PEM File: {}", cli.pem.display());
    println!("Client ID: {}", cli.client_id);
    println!("CSV File: {}", cli.csv.display());

    if cli.client_id.trim().is_empty() {
        anyhow::bail!("--client-id must not be empty");
    }

    let certificate = ClientCertificate::load(&cli.pem)?;
    info!(
        "Loaded client certificate chain with {} certificate(s)",
        certificate.chain().len()
    );
    let records = load_records(&cli.csv, cli.has_headers)?;
    info!("Loaded {} record(s) from {}", records.len(), cli.csv.display());

    let http_client = reqwest::Client::builder()
        .timeout(runtime.request_timeout())
        .user_agent(concat!("cluster-identity-remediator/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let credentials = Arc::new(AzureCredentialProvider::new(
        runtime.authority_host.clone(),
        http_client.clone(),
    ));
    let clusters = Arc::new(AzureClusterClientFactory::new(
        http_client,
        ArmClientConfig::from(&runtime),
    ));

    let cancellation = CancellationToken::new();
    let ctrl_c = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining records");
            ctrl_c.cancel();
        }
    });

    let reconciler = ClusterReconciler::new(clusters, batch.clone());
    let runner = BatchRunner::new(
        credentials,
        reconciler,
        CertificateIdentity::new(cli.client_id.clone(), certificate),
        batch,
    )
    .with_cancellation(cancellation);

    let reports = runner.run(records).await;

    let summary = Summary::from_reports(&reports);
    print!("{summary}");

    if let Some(path) = &cli.report {
        report::write_report_file(path, &reports)?;
        info!("Wrote report to {}", path.display());
    }
    if let Some(path) = &cli.metrics_file {
        metrics::write_to_file(path)?;
        info!("Wrote metrics to {}", path.display());
    }

    Ok(())
}
