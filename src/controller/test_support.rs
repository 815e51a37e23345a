//! In-memory fakes shared by the controller unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};

use crate::provider::azure::certificate::ClientCertificate;
use crate::provider::azure::models::{
    ClusterUpdate, ManagedCluster, ManagedClusterIdentity, ManagedClusterProperties,
    OperationState, OperationStatus, SubmittedOperation,
};
use crate::provider::{
    ArmError, CertificateIdentity, ClusterClientFactory, CredentialError, CredentialOptions,
    CredentialProvider, ManagedClusterApi, TenantCredential,
};
use crate::resource_id::ParsedResourceId;

const BUNDLE: &str = include_str!("../../tests/fixtures/client-chain.pem");

pub fn identity() -> CertificateIdentity {
    CertificateIdentity::new(
        "00000000-0000-0000-0000-000000000001",
        ClientCertificate::from_pem(BUNDLE).unwrap(),
    )
}

#[derive(Debug)]
pub struct StaticTokenCredential;

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        use typespec_client_core::time::{Duration, OffsetDateTime};

        Ok(AccessToken::new(
            Secret::new("test-token".to_string()),
            OffsetDateTime::now_utc() + Duration::seconds(3600),
        ))
    }
}

pub fn static_credential() -> TenantCredential {
    Arc::new(StaticTokenCredential)
}

/// Records every build and fails for the configured tenants
#[derive(Debug, Default)]
pub struct CountingProvider {
    failing: Vec<String>,
    calls: Mutex<Vec<(String, CredentialOptions)>>,
}

impl CountingProvider {
    pub fn failing_for(tenants: &[&str]) -> Self {
        Self {
            failing: tenants.iter().map(ToString::to_string).collect(),
            calls: Mutex::default(),
        }
    }

    pub fn tenants(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(tenant, _)| tenant.clone())
            .collect()
    }

    pub fn last_options(&self) -> Option<CredentialOptions> {
        self.calls.lock().unwrap().last().map(|(_, options)| *options)
    }
}

impl CredentialProvider for CountingProvider {
    fn build(
        &self,
        tenant_id: &str,
        _identity: &CertificateIdentity,
        options: CredentialOptions,
    ) -> Result<TenantCredential, CredentialError> {
        self.calls
            .lock()
            .unwrap()
            .push((tenant_id.to_string(), options));
        if self.failing.iter().any(|t| t == tenant_id) {
            return Err(CredentialError::InvalidTenantId {
                tenant_id: tenant_id.to_string(),
                reason: "rejected by test provider".to_string(),
            });
        }
        Ok(static_credential())
    }
}

pub fn cluster_with_identity(identity_type: Option<&str>) -> ManagedCluster {
    ManagedCluster {
        id: None,
        name: Some("aks-1".to_string()),
        location: "westeurope".to_string(),
        sku: None,
        tags: Some(
            [("env".to_string(), "prod".to_string())]
                .into_iter()
                .collect(),
        ),
        identity: identity_type.map(|t| ManagedClusterIdentity {
            identity_type: Some(t.to_string()),
            principal_id: None,
            tenant_id: None,
        }),
        properties: Some(ManagedClusterProperties {
            dns_prefix: Some("aks-1-dns".to_string()),
            provisioning_state: Some("Succeeded".to_string()),
        }),
    }
}

type ClusterKey = (String, String, String);

#[derive(Debug, Default)]
struct FakeState {
    clusters: HashMap<ClusterKey, ManagedCluster>,
    gets: usize,
    submissions: Vec<(ClusterKey, Vec<u8>)>,
    fail_submissions: bool,
    statuses: VecDeque<OperationState>,
    polls: usize,
}

/// In-memory managed clusters keyed by subscription, group and name
#[derive(Debug, Clone, Default)]
pub struct FakeClusters {
    state: Arc<Mutex<FakeState>>,
}

impl FakeClusters {
    pub fn insert(&self, id: &ParsedResourceId, cluster: ManagedCluster) {
        self.state.lock().unwrap().clusters.insert(key(id), cluster);
    }

    pub fn fail_submissions(&self) {
        self.state.lock().unwrap().fail_submissions = true;
    }

    pub fn push_statuses(&self, states: impl IntoIterator<Item = OperationState>) {
        self.state.lock().unwrap().statuses.extend(states);
    }

    pub fn gets(&self) -> usize {
        self.state.lock().unwrap().gets
    }

    pub fn polls(&self) -> usize {
        self.state.lock().unwrap().polls
    }

    pub fn submissions(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .submissions
            .iter()
            .map(|((_, _, name), _)| name.clone())
            .collect()
    }

    pub fn submitted_bodies(&self) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .submissions
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

fn key(id: &ParsedResourceId) -> ClusterKey {
    (
        id.subscription_id.clone(),
        id.resource_group.clone(),
        id.resource_name.clone(),
    )
}

impl ClusterClientFactory for FakeClusters {
    fn client(
        &self,
        subscription_id: &str,
        _credential: TenantCredential,
    ) -> Result<Box<dyn ManagedClusterApi>, ArmError> {
        Ok(Box::new(FakeClient {
            subscription_id: subscription_id.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeClient {
    subscription_id: String,
    state: Arc<Mutex<FakeState>>,
}

impl FakeClient {
    fn key(&self, resource_group: &str, name: &str) -> ClusterKey {
        (
            self.subscription_id.clone(),
            resource_group.to_string(),
            name.to_string(),
        )
    }
}

#[async_trait]
impl ManagedClusterApi for FakeClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<ManagedCluster, ArmError> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        state
            .clusters
            .get(&self.key(resource_group, name))
            .cloned()
            .ok_or_else(|| ArmError::Status {
                operation: "get",
                status: 404,
                code: "ResourceNotFound".to_string(),
                message: format!("cluster {name} not found"),
            })
    }

    async fn begin_create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        update: &ClusterUpdate,
    ) -> Result<SubmittedOperation, ArmError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_submissions {
            return Err(ArmError::Status {
                operation: "create_or_update",
                status: 409,
                code: "OperationNotAllowed".to_string(),
                message: "another operation is in progress".to_string(),
            });
        }
        let body = update.to_body().map_err(ArmError::Encode)?;
        state.submissions.push((self.key(resource_group, name), body));
        Ok(SubmittedOperation::accepted(
            201,
            Some("https://status.test/operations/1".to_string()),
        ))
    }

    async fn poll_operation(
        &self,
        _operation: &SubmittedOperation,
    ) -> Result<OperationStatus, ArmError> {
        let mut state = self.state.lock().unwrap();
        state.polls += 1;
        let next = state
            .statuses
            .pop_front()
            .unwrap_or(OperationState::InProgress);
        Ok(OperationStatus {
            state: next,
            error: None,
        })
    }
}
