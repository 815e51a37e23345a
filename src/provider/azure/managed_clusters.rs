//! # Managed Clusters Client
//!
//! Native REST client for `Microsoft.ContainerService/managedClusters` on
//! Azure Resource Manager. Uses reqwest and a bearer token from the tenant
//! credential.
//!
//! Create-or-update is a long-running operation: the PUT returns once ARM has
//! accepted it, and the `Azure-AsyncOperation` (or `Location`) header names
//! the URL to poll for completion.
//!
//! References:
//! - [ARM async operations](https://learn.microsoft.com/azure/azure-resource-manager/management/async-operations)

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info_span, Instrument};

use super::models::{
    ArmErrorResponse, ClusterUpdate, ManagedCluster, OperationState, OperationStatus,
    OperationStatusBody, StatusUrlKind, SubmittedOperation,
};
use crate::config::RuntimeConfig;
use crate::constants::{DEFAULT_ARM_ENDPOINT, DEFAULT_MANAGED_CLUSTERS_API_VERSION};
use crate::observability::metrics;
use crate::provider::{ArmError, ClusterClientFactory, ManagedClusterApi, TenantCredential};

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Resource manager endpoint and API version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmClientConfig {
    pub endpoint: String,
    pub api_version: String,
}

impl Default for ArmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            api_version: DEFAULT_MANAGED_CLUSTERS_API_VERSION.to_string(),
        }
    }
}

impl From<&RuntimeConfig> for ArmClientConfig {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            endpoint: config.arm_endpoint.clone(),
            api_version: config.managed_clusters_api_version.clone(),
        }
    }
}

impl ArmClientConfig {
    /// Token scope for the resource manager audience
    pub fn scope(&self) -> String {
        format!("{}/.default", self.endpoint.trim_end_matches('/'))
    }
}

/// Builds [`ManagedClustersClient`]s sharing one HTTP connection pool
#[derive(Debug, Clone)]
pub struct AzureClusterClientFactory {
    http_client: Client,
    config: ArmClientConfig,
}

impl AzureClusterClientFactory {
    #[must_use]
    pub fn new(http_client: Client, config: ArmClientConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

impl ClusterClientFactory for AzureClusterClientFactory {
    fn client(
        &self,
        subscription_id: &str,
        credential: TenantCredential,
    ) -> Result<Box<dyn ManagedClusterApi>, ArmError> {
        let client = ManagedClustersClient::new(
            self.http_client.clone(),
            &self.config,
            subscription_id,
            credential,
        )?;
        Ok(Box::new(client))
    }
}

/// Managed cluster client bound to one subscription and one tenant credential
pub struct ManagedClustersClient {
    http_client: Client,
    endpoint: Url,
    api_version: String,
    scope: String,
    subscription_id: String,
    credential: TenantCredential,
}

impl std::fmt::Debug for ManagedClustersClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedClustersClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_version", &self.api_version)
            .field("subscription_id", &self.subscription_id)
            .finish_non_exhaustive()
    }
}

impl ManagedClustersClient {
    /// Create a client for `subscription_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription ID is empty or the endpoint is
    /// not an absolute URL.
    pub fn new(
        http_client: Client,
        config: &ArmClientConfig,
        subscription_id: &str,
        credential: TenantCredential,
    ) -> Result<Self, ArmError> {
        if subscription_id.trim().is_empty() {
            return Err(ArmError::MissingSubscription);
        }
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ArmError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;
        if endpoint.cannot_be_a_base() {
            return Err(ArmError::InvalidEndpoint(format!(
                "{}: not a hierarchical URL",
                config.endpoint
            )));
        }

        Ok(Self {
            http_client,
            endpoint,
            api_version: config.api_version.clone(),
            scope: config.scope(),
            subscription_id: subscription_id.to_string(),
            credential,
        })
    }

    /// Full URL of a managed cluster resource, including the API version
    ///
    /// Every path segment is percent-encoded, so a name can never reach into
    /// the query or another resource.
    pub fn cluster_url(&self, resource_group: &str, name: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "subscriptions",
                self.subscription_id.as_str(),
                "resourceGroups",
                resource_group,
                "providers",
                "Microsoft.ContainerService",
                "managedClusters",
                name,
            ]);
        }
        url.query_pairs_mut()
            .clear()
            .append_pair("api-version", &self.api_version);
        url
    }

    async fn bearer_token(&self) -> Result<String, ArmError> {
        let token = self
            .credential
            .get_token(&[self.scope.as_str()], None)
            .await
            .map_err(|e| ArmError::Token(e.to_string()))?;
        Ok(token.token.secret().to_string())
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, ArmError> {
        let start = Instant::now();
        let result = request.send().await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(response) if response.status().is_success() => {
                metrics::record_arm_request(operation, true, elapsed);
                Ok(response)
            }
            Ok(response) => {
                metrics::record_arm_request(operation, false, elapsed);
                Err(status_error(operation, response).await)
            }
            Err(e) => {
                metrics::record_arm_request(operation, false, elapsed);
                Err(ArmError::Transport {
                    url: url.to_string(),
                    source: e,
                })
            }
        }
    }
}

/// Turn a non-2xx response into [`ArmError::Status`], reading the ARM error
/// envelope when present
async fn status_error(operation: &'static str, response: reqwest::Response) -> ArmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let (code, message) = match serde_json::from_str::<ArmErrorResponse>(&body) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => (
            status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        ),
    };

    ArmError::Status {
        operation,
        status: status.as_u16(),
        code,
        message,
    }
}

#[async_trait]
impl ManagedClusterApi for ManagedClustersClient {
    async fn get(&self, resource_group: &str, name: &str) -> Result<ManagedCluster, ArmError> {
        let span = info_span!(
            "azure.managed_clusters.get",
            subscription.id = %self.subscription_id,
            resource_group = resource_group,
            cluster.name = name
        );

        async move {
            let url = self.cluster_url(resource_group, name);
            let token = self.bearer_token().await?;
            let request = self.http_client.get(url.clone()).bearer_auth(token);
            let response = self.send("get", request, url.as_str()).await?;

            let body = response.bytes().await.map_err(|e| ArmError::Transport {
                url: url.to_string(),
                source: e,
            })?;
            serde_json::from_slice(&body).map_err(|e| ArmError::Decode {
                operation: "get",
                source: e,
            })
        }
        .instrument(span)
        .await
    }

    async fn begin_create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        update: &ClusterUpdate,
    ) -> Result<SubmittedOperation, ArmError> {
        let span = info_span!(
            "azure.managed_clusters.create_or_update",
            subscription.id = %self.subscription_id,
            resource_group = resource_group,
            cluster.name = name
        );

        async move {
            let url = self.cluster_url(resource_group, name);
            let body = update.to_body().map_err(ArmError::Encode)?;
            let token = self.bearer_token().await?;
            let request = self
                .http_client
                .put(url.clone())
                .bearer_auth(token)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
            let response = self.send("create_or_update", request, url.as_str()).await?;

            let status_code = response.status().as_u16();
            let headers = response.headers();
            let header_value = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let operation = match header_value(ASYNC_OPERATION_HEADER) {
                Some(status_url) => SubmittedOperation::accepted(status_code, Some(status_url)),
                None => match header_value(reqwest::header::LOCATION.as_str()) {
                    Some(location) => SubmittedOperation::accepted_with_location(status_code, location),
                    None => SubmittedOperation::accepted(status_code, None),
                },
            };

            debug!(
                "Update accepted with HTTP {} (status URL: {:?}, {:?})",
                status_code, operation.status_url, operation.status_url_kind
            );
            Ok(operation)
        }
        .instrument(span)
        .await
    }

    async fn poll_operation(
        &self,
        operation: &SubmittedOperation,
    ) -> Result<OperationStatus, ArmError> {
        let url = operation
            .status_url
            .as_deref()
            .ok_or(ArmError::NoStatusUrl)?;
        let token = self.bearer_token().await?;
        let request = self.http_client.get(url).bearer_auth(token);
        let response = self.send("poll_operation", request, url).await?;

        // Location polling answers 202 until done and then returns the resource
        if response.status() == StatusCode::ACCEPTED {
            return Ok(OperationStatus {
                state: OperationState::InProgress,
                error: None,
            });
        }

        let body = response.bytes().await.map_err(|e| ArmError::Transport {
            url: url.to_string(),
            source: e,
        })?;
        match (
            serde_json::from_slice::<OperationStatusBody>(&body),
            operation.status_url_kind,
        ) {
            (Ok(status), _) => Ok(status.into()),
            // A finished Location poll returns the resource, not a status body
            (Err(_), StatusUrlKind::Location) => Ok(OperationStatus {
                state: OperationState::Succeeded,
                error: None,
            }),
            (Err(e), StatusUrlKind::AsyncOperation) => Err(ArmError::Decode {
                operation: "poll_operation",
                source: e,
            }),
        }
    }
}
