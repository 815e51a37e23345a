//! # Batch Runner
//!
//! Drives records through parsing, the credential cache and the cluster
//! reconciler. Every record yields exactly one [`RecordOutcome`], in input
//! order, no matter which stage failed.
//!
//! ## Modes
//!
//! - **Sequential** (`max_parallel_tenants == 1`): one credential cache, records
//!   handled strictly in input order. A credential is rebuilt whenever the
//!   tenant differs from the previous record's.
//! - **Parallel** (`max_parallel_tenants > 1`): records are grouped by tenant,
//!   keeping their relative order. Each tenant gets a worker with its own
//!   cache, at most `max_parallel_tenants` workers run at once, and outcomes
//!   come back over a channel tagged with their input index.
//!
//! Cancellation is checked before each record and handed to the reconciler,
//! which honours it up to the point the update is submitted. Records not
//! processed report [`RecordOutcome::Cancelled`]; a record whose update was
//! already sent reports that update.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::BatchConfig;
use crate::controller::credential_cache::CredentialCache;
use crate::controller::reconciler::ClusterReconciler;
use crate::controller::types::{RecordOutcome, RecordReport, ResourceRecord};
use crate::observability::metrics;
use crate::provider::{CertificateIdentity, CredentialProvider};
use crate::resource_id::parse_resource_id;

#[derive(Clone)]
pub struct BatchRunner {
    credentials: Arc<dyn CredentialProvider>,
    reconciler: ClusterReconciler,
    identity: CertificateIdentity,
    config: BatchConfig,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("client_id", &self.identity.client_id)
            .field("config", &self.config)
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        reconciler: ClusterReconciler,
        identity: CertificateIdentity,
        config: BatchConfig,
    ) -> Self {
        Self {
            credentials,
            reconciler,
            identity,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    /// Stop the run when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Process every record and return one report per record, in input order
    pub async fn run(&self, records: Vec<ResourceRecord>) -> Vec<RecordReport> {
        info!(
            "Processing {} record(s) (dry run: {}, tenant workers: {})",
            records.len(),
            self.config.dry_run,
            self.config.max_parallel_tenants
        );

        if self.config.is_parallel() {
            self.run_parallel(records).await
        } else {
            self.run_sequential(records).await
        }
    }

    async fn run_sequential(&self, records: Vec<ResourceRecord>) -> Vec<RecordReport> {
        let mut cache = CredentialCache::new(Arc::clone(&self.credentials));
        let mut reports = Vec::with_capacity(records.len());

        for record in records {
            let outcome = self.process(&mut cache, &record).await;
            reports.push(finish(record, outcome));
        }

        reports
    }

    async fn run_parallel(&self, records: Vec<ResourceRecord>) -> Vec<RecordReport> {
        let groups = group_by_tenant(&records);
        info!("Dispatching {} tenant group(s)", groups.len());

        let records = Arc::new(records);
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_tenants));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, RecordOutcome)>();
        let mut workers = JoinSet::new();

        for (tenant_id, indices) in groups {
            let runner = self.clone();
            let records = Arc::clone(&records);
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let span = info_span!("tenant_worker", tenant.id = %tenant_id);

            workers.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    let mut cache = CredentialCache::new(Arc::clone(&runner.credentials));
                    for index in indices {
                        let outcome = runner.process(&mut cache, &records[index]).await;
                        if tx.send((index, outcome)).is_err() {
                            return;
                        }
                    }
                }
                .instrument(span),
            );
        }
        drop(tx);

        let mut reports: Vec<Option<RecordReport>> = (0..records.len()).map(|_| None).collect();
        while let Some((index, outcome)) = rx.recv().await {
            reports[index] = Some(finish(records[index].clone(), outcome));
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Tenant worker terminated: {}", e);
            }
        }

        reports
            .into_iter()
            .zip(records.iter())
            .map(|(report, record)| {
                report.unwrap_or_else(|| {
                    finish(
                        record.clone(),
                        RecordOutcome::Aborted("tenant worker terminated before reporting".to_string()),
                    )
                })
            })
            .collect()
    }

    async fn process(&self, cache: &mut CredentialCache, record: &ResourceRecord) -> RecordOutcome {
        if self.cancellation.is_cancelled() {
            return RecordOutcome::Cancelled;
        }

        let id = match parse_resource_id(&record.resource_path) {
            Ok(id) => id,
            Err(e) => return RecordOutcome::MalformedResourceId(e),
        };

        let credential = match cache.credential_for(&record.tenant_id, &self.identity) {
            Ok(credential) => credential,
            Err(e) => return RecordOutcome::Credential(e),
        };

        self.reconciler
            .reconcile(credential, &id, self.config.dry_run, &self.cancellation)
            .await
            .map_or(RecordOutcome::Cancelled, RecordOutcome::Reconciled)
    }
}

/// Log and count one outcome
fn finish(record: ResourceRecord, outcome: RecordOutcome) -> RecordReport {
    metrics::increment_records(outcome.label());

    if outcome.is_failure() {
        warn!(
            record.line = record.line,
            tenant.id = %record.tenant_id,
            outcome = outcome.label(),
            "{}: {}",
            record.resource_path,
            outcome
        );
    } else {
        info!(
            record.line = record.line,
            tenant.id = %record.tenant_id,
            outcome = outcome.label(),
            "{}: {}",
            record.resource_path,
            outcome
        );
    }

    RecordReport { record, outcome }
}

/// Indices of each tenant's records, tenants in order of first appearance
fn group_by_tenant(records: &[ResourceRecord]) -> Vec<(String, Vec<usize>)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let slot = *positions.entry(record.tenant_id.as_str()).or_insert_with(|| {
            groups.push((record.tenant_id.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(index);
    }

    groups
}
