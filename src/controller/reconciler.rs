//! # Cluster Reconciler
//!
//! Reconciles one managed cluster:
//!
//! ```text
//! Fetching -> Failed | Evaluating
//! Evaluating -> Unchanged | Skipped | Submitting
//! Submitting -> Updated | Failed
//! ```
//!
//! Every state is terminal for the cluster; nothing is retried here. Dry-run
//! is checked after the GET and before any mutating call, so a dry run still
//! reports what would happen.
//!
//! Submission is fire-and-forget unless completion tracking is enabled, in
//! which case the operation status is polled with a Fibonacci backoff until
//! it is terminal or the operation deadline passes.
//!
//! Cancellation only takes effect before the PUT is sent. Once ARM has been
//! asked to change the cluster the record reports `Updated`, and a
//! cancellation during tracking just stops polling.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::BatchConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::policy::{NormalizationPolicy, PolicyDecision, SystemAssignedIdentityPolicy};
use crate::controller::types::{ReconcileError, ReconcileOutcome, SkipReason};
use crate::provider::azure::models::{OperationState, SubmittedOperation};
use crate::provider::{ClusterClientFactory, ManagedClusterApi, TenantCredential};
use crate::resource_id::ParsedResourceId;

/// Reconciles managed clusters against a [`NormalizationPolicy`]
#[derive(Clone)]
pub struct ClusterReconciler {
    clients: Arc<dyn ClusterClientFactory>,
    policy: Arc<dyn NormalizationPolicy>,
    config: BatchConfig,
}

impl std::fmt::Debug for ClusterReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterReconciler")
            .field("policy", &self.policy.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClusterReconciler {
    /// Create a reconciler using the system-assigned identity policy
    #[must_use]
    pub fn new(clients: Arc<dyn ClusterClientFactory>, config: BatchConfig) -> Self {
        Self {
            clients,
            policy: Arc::new(SystemAssignedIdentityPolicy),
            config,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn NormalizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Reconcile the cluster identified by `id` in the tenant of `credential`
    ///
    /// Returns `None` when `cancellation` fired before the update was
    /// submitted, in which case the cluster was left untouched.
    pub async fn reconcile(
        &self,
        credential: TenantCredential,
        id: &ParsedResourceId,
        dry_run: bool,
        cancellation: &CancellationToken,
    ) -> Option<ReconcileOutcome> {
        let span = info_span!(
            "reconcile_cluster",
            subscription.id = %id.subscription_id,
            resource.group = %id.resource_group,
            resource.name = %id.resource_name,
            dry_run = dry_run
        );

        self.reconcile_internal(credential, id, dry_run, cancellation)
            .instrument(span)
            .await
    }

    async fn reconcile_internal(
        &self,
        credential: TenantCredential,
        id: &ParsedResourceId,
        dry_run: bool,
        cancellation: &CancellationToken,
    ) -> Option<ReconcileOutcome> {
        let client = match self.clients.client(&id.subscription_id, credential) {
            Ok(client) => client,
            Err(e) => return Some(ReconcileOutcome::Failed(ReconcileError::Client(e))),
        };

        // Fetching
        let fetched = tokio::select! {
            biased;
            () = cancellation.cancelled() => return None,
            fetched = client.get(&id.resource_group, &id.resource_name) => fetched,
        };
        let cluster = match fetched {
            Ok(cluster) => cluster,
            Err(e) => {
                warn!("Failed to get cluster {}: {}", id, e);
                return Some(ReconcileOutcome::Failed(ReconcileError::Get(e)));
            }
        };

        // Evaluating
        match self.policy.evaluate(&cluster) {
            PolicyDecision::Apply => {}
            PolicyDecision::InSync => {
                debug!("Cluster {} already satisfies {}", id, self.policy.name());
                return Some(ReconcileOutcome::Unchanged);
            }
            PolicyDecision::NotApplicable(reason) => {
                debug!(
                    "Cluster {} not covered by {} (identity type: {:?})",
                    id,
                    self.policy.name(),
                    cluster.identity_type()
                );
                return Some(ReconcileOutcome::Skipped(reason));
            }
        }

        if dry_run {
            info!("Dry run: would update cluster {}", id);
            return Some(ReconcileOutcome::Skipped(SkipReason::DryRun));
        }
        if cancellation.is_cancelled() {
            return None;
        }

        // Submitting. The PUT is never raced against cancellation.
        let update = self.policy.desired_state(&cluster);
        info!("Submitting update for cluster {}", id);
        let operation = match client
            .begin_create_or_update(&id.resource_group, &id.resource_name, &update)
            .await
        {
            Ok(operation) => operation,
            Err(e) => {
                warn!("Failed to submit update for cluster {}: {}", id, e);
                return Some(ReconcileOutcome::Failed(ReconcileError::Submit(e)));
            }
        };

        if !self.config.wait_for_completion {
            return Some(ReconcileOutcome::Updated(operation));
        }
        if operation.status_url.is_none() {
            debug!("Update for cluster {} returned no status URL; nothing to track", id);
            return Some(ReconcileOutcome::Updated(operation));
        }

        Some(
            match self
                .wait_for_completion(client.as_ref(), operation, cancellation)
                .await
            {
                Ok(operation) => ReconcileOutcome::Updated(operation),
                Err(e) => ReconcileOutcome::Failed(e),
            },
        )
    }

    /// Poll until the operation is terminal, the deadline passes or the run
    /// is cancelled
    ///
    /// A cancelled wait returns the operation without a final status.
    async fn wait_for_completion(
        &self,
        client: &dyn ManagedClusterApi,
        operation: SubmittedOperation,
        cancellation: &CancellationToken,
    ) -> Result<SubmittedOperation, ReconcileError> {
        let deadline = Instant::now() + self.config.operation_timeout;
        let mut backoff = FibonacciBackoff::from_bounds(
            self.config.poll_interval_min,
            self.config.poll_interval_max,
        );

        loop {
            let polled = tokio::select! {
                biased;
                () = cancellation.cancelled() => None,
                polled = client.poll_operation(&operation) => Some(polled),
            };
            let Some(polled) = polled else {
                info!("Cancelled while tracking a submitted update; leaving it to finish");
                return Ok(operation);
            };
            let status = polled.map_err(ReconcileError::Poll)?;

            match status.state {
                OperationState::Succeeded => return Ok(operation.with_final_status(status)),
                OperationState::Failed | OperationState::Canceled => {
                    return Err(ReconcileError::Operation {
                        state: status.state,
                        message: status.error,
                    });
                }
                OperationState::InProgress => {}
            }

            let delay = backoff.next_backoff();
            if Instant::now() + delay >= deadline {
                return Err(ReconcileError::OperationTimeout(self.config.operation_timeout));
            }
            debug!("Operation still in progress, polling again in {:?}", delay);
            tokio::select! {
                biased;
                () = cancellation.cancelled() => {
                    info!("Cancelled while tracking a submitted update; leaving it to finish");
                    return Ok(operation);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::{cluster_with_identity, static_credential, FakeClusters};
    use crate::provider::azure::models::OperationStatus;
    use std::time::Duration;

    fn id() -> ParsedResourceId {
        ParsedResourceId {
            subscription_id: "sub-1".to_string(),
            resource_group: "rg-1".to_string(),
            resource_name: "aks-1".to_string(),
        }
    }

    fn reconciler(fake: &Arc<FakeClusters>, config: BatchConfig) -> ClusterReconciler {
        ClusterReconciler::new(Arc::clone(fake) as Arc<dyn ClusterClientFactory>, config)
    }

    #[tokio::test]
    async fn test_system_assigned_cluster_is_updated_once() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        let outcome = reconciler(&fake, BatchConfig::default())
            .reconcile(static_credential(), &id(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
        assert_eq!(fake.gets(), 1);
        assert_eq!(fake.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_fetches_but_never_submits() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        let outcome = reconciler(&fake, BatchConfig::default())
            .reconcile(static_credential(), &id(), true, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Skipped(SkipReason::DryRun)));
        assert_eq!(fake.gets(), 1);
        assert!(fake.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_without_identity_is_skipped_regardless_of_dry_run() {
        for dry_run in [false, true] {
            let fake = Arc::new(FakeClusters::default());
            fake.insert(&id(), cluster_with_identity(None));
            let outcome = reconciler(&fake, BatchConfig::default())
                .reconcile(static_credential(), &id(), dry_run, &CancellationToken::new())
                .await
                .unwrap();

            assert!(matches!(
                outcome,
                ReconcileOutcome::Skipped(SkipReason::IdentityMismatch)
            ));
            assert!(fake.submissions().is_empty());
        }
    }

    #[tokio::test]
    async fn test_get_failure_is_reported() {
        let fake = Arc::new(FakeClusters::default());
        let outcome = reconciler(&fake, BatchConfig::default())
            .reconcile(static_credential(), &id(), false, &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            ReconcileOutcome::Failed(ReconcileError::Get(e)) => assert_eq!(e.status(), Some(404)),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(fake.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure_is_reported() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        fake.fail_submissions();
        let outcome = reconciler(&fake, BatchConfig::default())
            .reconcile(static_credential(), &id(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Failed(ReconcileError::Submit(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_reconcile_submits_identical_bodies() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        let reconciler = reconciler(&fake, BatchConfig::default());

        for _ in 0..2 {
            let outcome = reconciler
                .reconcile(static_credential(), &id(), false, &CancellationToken::new())
                .await
                .unwrap();
            assert!(matches!(outcome, ReconcileOutcome::Updated(_)));
        }

        let bodies = fake.submitted_bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
    }

    fn waiting_config(timeout: Duration) -> BatchConfig {
        BatchConfig {
            wait_for_completion: true,
            operation_timeout: timeout,
            poll_interval_min: Duration::ZERO,
            poll_interval_max: Duration::ZERO,
            ..BatchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_wait_tracks_operation_to_success() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        fake.push_statuses([OperationState::InProgress, OperationState::InProgress, OperationState::Succeeded]);
        let outcome = reconciler(&fake, waiting_config(Duration::from_secs(30)))
            .reconcile(static_credential(), &id(), false, &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            ReconcileOutcome::Updated(operation) => assert_eq!(
                operation.final_status,
                Some(OperationStatus {
                    state: OperationState::Succeeded,
                    error: None
                })
            ),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(fake.polls(), 3);
    }

    #[tokio::test]
    async fn test_wait_reports_failed_operation() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        fake.push_statuses([OperationState::Failed]);
        let outcome = reconciler(&fake, waiting_config(Duration::from_secs(30)))
            .reconcile(static_credential(), &id(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Failed(ReconcileError::Operation {
                state: OperationState::Failed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        let outcome = reconciler(&fake, waiting_config(Duration::ZERO))
            .reconcile(static_credential(), &id(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReconcileOutcome::Failed(ReconcileError::OperationTimeout(_))
        ));
        assert_eq!(fake.polls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_submit_leaves_cluster_untouched() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        let token = CancellationToken::new();
        token.cancel();

        let outcome = reconciler(&fake, BatchConfig::default())
            .reconcile(static_credential(), &id(), false, &token)
            .await;

        assert!(outcome.is_none());
        assert!(fake.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_tracking_still_reports_update() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        let config = BatchConfig {
            wait_for_completion: true,
            operation_timeout: Duration::from_secs(60),
            poll_interval_min: Duration::from_secs(5),
            poll_interval_max: Duration::from_secs(5),
            ..BatchConfig::default()
        };
        let token = CancellationToken::new();
        let cancel = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                token.cancel();
            })
        };

        let outcome = tokio::time::timeout(
            Duration::from_secs(10),
            reconciler(&fake, config).reconcile(static_credential(), &id(), false, &token),
        )
        .await
        .expect("cancellation should stop tracking promptly");
        cancel.await.unwrap();

        match outcome {
            Some(ReconcileOutcome::Updated(operation)) => assert!(operation.final_status.is_none()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(fake.submissions().len(), 1);
        assert_eq!(fake.polls(), 1);
    }

    #[derive(Debug)]
    struct AlwaysInSync;

    impl NormalizationPolicy for AlwaysInSync {
        fn name(&self) -> &'static str {
            "always-in-sync"
        }

        fn evaluate(&self, _cluster: &crate::provider::azure::models::ManagedCluster) -> PolicyDecision {
            PolicyDecision::InSync
        }

        fn desired_state(
            &self,
            cluster: &crate::provider::azure::models::ManagedCluster,
        ) -> crate::provider::azure::models::ClusterUpdate {
            crate::provider::azure::models::ClusterUpdate::system_assigned_from(cluster)
        }
    }

    #[tokio::test]
    async fn test_in_sync_policy_reports_unchanged() {
        let fake = Arc::new(FakeClusters::default());
        fake.insert(&id(), cluster_with_identity(Some("SystemAssigned")));
        let outcome = reconciler(&fake, BatchConfig::default())
            .with_policy(Arc::new(AlwaysInSync))
            .reconcile(static_credential(), &id(), false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, ReconcileOutcome::Unchanged));
        assert!(fake.submissions().is_empty());
    }
}
