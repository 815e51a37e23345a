//! # Credential Cache
//!
//! Holds at most one tenant credential. A new credential is built only when
//! the tenant changes between consecutive calls, so input clustered by tenant
//! authenticates once per run of records.
//!
//! A failed construction is cached like a success: records of the same
//! tenant that immediately follow receive the same [`CredentialError`]
//! without another attempt.

use std::sync::Arc;

use tracing::{debug, info};

use crate::observability::metrics;
use crate::provider::{
    CertificateIdentity, CredentialError, CredentialOptions, CredentialProvider, TenantCredential,
};

/// Size-one, tenant-keyed credential cache
pub struct CredentialCache {
    provider: Arc<dyn CredentialProvider>,
    options: CredentialOptions,
    current_tenant: Option<String>,
    current: Option<Result<TenantCredential, CredentialError>>,
    builds: usize,
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("current_tenant", &self.current_tenant)
            .field("builds", &self.builds)
            .finish_non_exhaustive()
    }
}

impl CredentialCache {
    #[must_use]
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self::with_options(provider, CredentialOptions::default())
    }

    #[must_use]
    pub fn with_options(provider: Arc<dyn CredentialProvider>, options: CredentialOptions) -> Self {
        Self {
            provider,
            options,
            current_tenant: None,
            current: None,
            builds: 0,
        }
    }

    /// Credential for `tenant_id`, reusing the cached one when the tenant is unchanged
    ///
    /// # Errors
    ///
    /// Returns the [`CredentialError`] from construction, or the cached one
    /// when the previous attempt for the same tenant failed.
    pub fn credential_for(
        &mut self,
        tenant_id: &str,
        identity: &CertificateIdentity,
    ) -> Result<TenantCredential, CredentialError> {
        if let (Some(tenant), Some(cached)) = (&self.current_tenant, &self.current) {
            if tenant == tenant_id {
                debug!("Reusing credential for tenant {}", tenant_id);
                return cached.clone();
            }
        }

        info!("Building credential for tenant {}", tenant_id);
        let result = self.provider.build(tenant_id, identity, self.options);
        self.builds += 1;
        metrics::increment_credential_builds();

        self.current_tenant = Some(tenant_id.to_string());
        self.current = Some(result.clone());
        result
    }

    /// Number of credential constructions so far
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn current_tenant(&self) -> Option<&str> {
        self.current_tenant.as_deref()
    }
}
