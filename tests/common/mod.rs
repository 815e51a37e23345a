//! Common test utilities for integration tests
//!
//! Provides rustls setup, the fixture identity, and scripted fakes for the
//! credential provider and the managed cluster client that log every call in
//! order.

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};

use cluster_identity_remediator::provider::azure::models::{
    ClusterUpdate, ManagedCluster, OperationState, OperationStatus, SubmittedOperation,
};
use cluster_identity_remediator::provider::azure::ClientCertificate;
use cluster_identity_remediator::{
    ArmError, CertificateIdentity, ClusterClientFactory, CredentialError, CredentialOptions,
    CredentialProvider, ManagedClusterApi, TenantCredential,
};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once per test binary.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Another test binary component may have installed it already
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

pub const CLIENT_ID: &str = "0b1e2c3d-4e5f-6071-8293-a4b5c6d7e8f9";

pub fn fixture_pem_path() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/client-chain.pem")
}

pub fn identity() -> CertificateIdentity {
    let certificate = ClientCertificate::load(&fixture_pem_path()).unwrap();
    CertificateIdentity::new(CLIENT_ID, certificate)
}

pub fn cluster_path(subscription: &str, resource_group: &str, name: &str) -> String {
    format!(
        "/subscriptions/{subscription}/resourceGroups/{resource_group}/providers/Microsoft.ContainerService/managedClusters/{name}"
    )
}

pub fn cluster_json(identity_type: Option<&str>) -> serde_json::Value {
    let mut cluster = serde_json::json!({
        "id": cluster_path("sub-1", "rg-1", "aks-1"),
        "name": "aks-1",
        "location": "westeurope",
        "sku": { "name": "Base", "tier": "Free" },
        "tags": { "env": "prod", "owner": "platform" },
        "properties": {
            "dnsPrefix": "aks-1-dns",
            "provisioningState": "Succeeded",
            "kubernetesVersion": "1.30.5"
        }
    });
    if let Some(identity_type) = identity_type {
        cluster["identity"] = serde_json::json!({
            "type": identity_type,
            "principalId": "11111111-2222-3333-4444-555555555555",
            "tenantId": "66666666-7777-8888-9999-000000000000"
        });
    }
    cluster
}

pub fn cluster(identity_type: Option<&str>) -> ManagedCluster {
    serde_json::from_value(cluster_json(identity_type)).unwrap()
}

/// One observed collaborator call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Build(String),
    Get(String),
    Submit(String),
    Poll,
}

#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl CallLog {
    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn builds(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Build(tenant) => Some(tenant),
                _ => None,
            })
            .collect()
    }

    pub fn submissions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Submit(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }
}

/// Mock TokenCredential that returns a dummy token
#[derive(Debug)]
pub struct FakeTokenCredential;

#[async_trait]
impl TokenCredential for FakeTokenCredential {
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

/// Credential provider that logs builds and rejects configured tenants
#[derive(Debug)]
pub struct FakeCredentialProvider {
    log: Arc<CallLog>,
    rejected: HashSet<String>,
}

impl FakeCredentialProvider {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            rejected: HashSet::new(),
        }
    }

    pub fn rejecting(mut self, tenant_id: &str) -> Self {
        self.rejected.insert(tenant_id.to_string());
        self
    }
}

impl CredentialProvider for FakeCredentialProvider {
    fn build(
        &self,
        tenant_id: &str,
        _identity: &CertificateIdentity,
        options: CredentialOptions,
    ) -> Result<TenantCredential, CredentialError> {
        assert!(options.send_certificate_chain);
        assert!(options.disable_instance_discovery);
        self.log.push(Call::Build(tenant_id.to_string()));
        if self.rejected.contains(tenant_id) {
            return Err(CredentialError::InvalidTenantId {
                tenant_id: tenant_id.to_string(),
                reason: "tenant not found".to_string(),
            });
        }
        Ok(Arc::new(FakeTokenCredential))
    }
}

/// Managed clusters keyed by name; unknown names answer 404
#[derive(Debug, Clone)]
pub struct ScriptedClusters {
    log: Arc<CallLog>,
    clusters: Arc<Mutex<HashMap<String, ManagedCluster>>>,
    get_delay: Option<Duration>,
    submit_delay: Option<Duration>,
}

impl ScriptedClusters {
    pub fn new(log: Arc<CallLog>) -> Self {
        Self {
            log,
            clusters: Arc::default(),
            get_delay: None,
            submit_delay: None,
        }
    }

    pub fn with_cluster(self, name: &str, cluster: ManagedCluster) -> Self {
        self.clusters
            .lock()
            .unwrap()
            .insert(name.to_string(), cluster);
        self
    }

    pub fn with_get_delay(mut self, delay: Duration) -> Self {
        self.get_delay = Some(delay);
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }
}

impl ClusterClientFactory for ScriptedClusters {
    fn client(
        &self,
        _subscription_id: &str,
        _credential: TenantCredential,
    ) -> Result<Box<dyn ManagedClusterApi>, ArmError> {
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl ManagedClusterApi for ScriptedClusters {
    async fn get(&self, _resource_group: &str, name: &str) -> Result<ManagedCluster, ArmError> {
        self.log.push(Call::Get(name.to_string()));
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        let found = self.clusters.lock().unwrap().get(name).cloned();
        found.ok_or_else(|| ArmError::Status {
            operation: "get",
            status: 404,
            code: "ResourceNotFound".to_string(),
            message: format!("managed cluster {name} was not found"),
        })
    }

    async fn begin_create_or_update(
        &self,
        _resource_group: &str,
        name: &str,
        update: &ClusterUpdate,
    ) -> Result<SubmittedOperation, ArmError> {
        self.log.push(Call::Submit(name.to_string()));
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }
        self.log
            .bodies
            .lock()
            .unwrap()
            .push(update.to_body().map_err(ArmError::Encode)?);
        Ok(SubmittedOperation::accepted(201, None))
    }

    async fn poll_operation(
        &self,
        _operation: &SubmittedOperation,
    ) -> Result<OperationStatus, ArmError> {
        self.log.push(Call::Poll);
        Ok(OperationStatus {
            state: OperationState::Succeeded,
            error: None,
        })
    }
}
