//! # Providers
//!
//! Seams between the batch logic and Azure.
//!
//! - [`CredentialProvider`] builds a tenant-scoped token credential
//! - [`ClusterClientFactory`] builds a subscription-scoped managed cluster client
//! - [`ManagedClusterApi`] reads and updates one managed cluster
//!
//! The `azure` module holds the production implementations. Tests substitute
//! in-memory fakes at the same seams.

use std::sync::Arc;

use async_trait::async_trait;
use azure_core::credentials::TokenCredential;

pub mod azure;
pub mod error;

pub use error::{ArmError, CredentialError};

use azure::certificate::ClientCertificate;
use azure::models::{ClusterUpdate, ManagedCluster, OperationStatus, SubmittedOperation};

/// Token credential shared by every record of one tenant
pub type TenantCredential = Arc<dyn TokenCredential>;

/// Application identity used to authenticate in every tenant
#[derive(Debug, Clone)]
pub struct CertificateIdentity {
    pub client_id: String,
    pub certificate: Arc<ClientCertificate>,
}

impl CertificateIdentity {
    #[must_use]
    pub fn new(client_id: impl Into<String>, certificate: ClientCertificate) -> Self {
        Self {
            client_id: client_id.into(),
            certificate: Arc::new(certificate),
        }
    }
}

/// Options applied to every tenant credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialOptions {
    /// Send the full certificate chain (`x5c`) with each assertion
    pub send_certificate_chain: bool,
    /// Skip authority validation so custom authority hosts work
    pub disable_instance_discovery: bool,
}

impl Default for CredentialOptions {
    fn default() -> Self {
        Self {
            send_certificate_chain: true,
            disable_instance_discovery: true,
        }
    }
}

/// Builds tenant-scoped credentials
///
/// Construction is local. Authentication failures surface on first use.
pub trait CredentialProvider: Send + Sync {
    /// Build a credential for `tenant_id`
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] if the inputs are rejected.
    fn build(
        &self,
        tenant_id: &str,
        identity: &CertificateIdentity,
        options: CredentialOptions,
    ) -> Result<TenantCredential, CredentialError>;
}

/// Managed cluster operations within one subscription
#[async_trait]
pub trait ManagedClusterApi: Send + Sync {
    /// Read the current state of a cluster
    async fn get(&self, resource_group: &str, name: &str) -> Result<ManagedCluster, ArmError>;

    /// Submit a create-or-update and return once it is accepted
    async fn begin_create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        update: &ClusterUpdate,
    ) -> Result<SubmittedOperation, ArmError>;

    /// Fetch the current status of a submitted operation
    async fn poll_operation(
        &self,
        operation: &SubmittedOperation,
    ) -> Result<OperationStatus, ArmError>;
}

/// Builds subscription-scoped managed cluster clients
pub trait ClusterClientFactory: Send + Sync {
    /// Build a client bound to `subscription_id` and `credential`
    ///
    /// # Errors
    ///
    /// Returns an [`ArmError`] if the client cannot be constructed.
    fn client(
        &self,
        subscription_id: &str,
        credential: TenantCredential,
    ) -> Result<Box<dyn ManagedClusterApi>, ArmError>;
}
