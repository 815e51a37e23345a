//! # Managed Cluster Models
//!
//! Subset of the `Microsoft.ContainerService/managedClusters` resource that the
//! remediator reads and writes, plus the long-running operation status body.
//!
//! References:
//! - [Managed Clusters - Get](https://learn.microsoft.com/rest/api/aks/managed-clusters/get)
//! - [Managed Clusters - Create Or Update](https://learn.microsoft.com/rest/api/aks/managed-clusters/create-or-update)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::SYSTEM_ASSIGNED_IDENTITY;

/// Managed cluster as returned by a GET
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCluster {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub location: String,
    #[serde(default)]
    pub sku: Option<ManagedClusterSku>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub identity: Option<ManagedClusterIdentity>,
    #[serde(default)]
    pub properties: Option<ManagedClusterProperties>,
}

impl ManagedCluster {
    /// DNS prefix from the cluster properties
    pub fn dns_prefix(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.dns_prefix.as_deref())
    }

    /// Identity type, if the cluster has an identity block
    pub fn identity_type(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .and_then(|i| i.identity_type.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterSku {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterIdentity {
    /// `SystemAssigned`, `UserAssigned` or `None`
    #[serde(rename = "type", default)]
    pub identity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedClusterProperties {
    #[serde(default)]
    pub dns_prefix: Option<String>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

/// Body of the create-or-update request
///
/// Built only from a just-fetched [`ManagedCluster`] so that no field is
/// sent empty by accident. Tags are an ordered map, which keeps the encoded
/// body byte-identical for identical input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterUpdate {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<ManagedClusterSku>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    pub identity: UpdateIdentity,
    pub properties: UpdateProperties,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateIdentity {
    #[serde(rename = "type")]
    pub identity_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_prefix: Option<String>,
}

impl ClusterUpdate {
    /// Copy location, SKU, tags and DNS prefix forward and pin the identity
    /// type to `SystemAssigned`
    #[must_use]
    pub fn system_assigned_from(cluster: &ManagedCluster) -> Self {
        Self {
            location: cluster.location.clone(),
            sku: cluster.sku.clone(),
            tags: cluster.tags.clone(),
            identity: UpdateIdentity {
                identity_type: SYSTEM_ASSIGNED_IDENTITY.to_string(),
            },
            properties: UpdateProperties {
                dns_prefix: cluster.dns_prefix().map(str::to_string),
            },
        }
    }

    /// Encode the request body
    ///
    /// # Errors
    ///
    /// Returns the serializer error; not expected for this type.
    pub fn to_body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Header the status URL came from
///
/// The two protocols answer differently: an `Azure-AsyncOperation` URL always
/// returns a status body, while a `Location` URL answers 202 until done and
/// then returns the resource itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUrlKind {
    AsyncOperation,
    Location,
}

/// Handle for an accepted create-or-update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOperation {
    /// HTTP status of the acceptance (200, 201 or 202)
    pub status_code: u16,
    /// `Azure-AsyncOperation` (or `Location`) URL to poll
    pub status_url: Option<String>,
    pub status_url_kind: StatusUrlKind,
    /// Terminal status, only set when completion was tracked
    pub final_status: Option<OperationStatus>,
}

impl SubmittedOperation {
    /// Accepted operation whose status URL, if any, is an
    /// `Azure-AsyncOperation` URL
    #[must_use]
    pub fn accepted(status_code: u16, status_url: Option<String>) -> Self {
        Self {
            status_code,
            status_url,
            status_url_kind: StatusUrlKind::AsyncOperation,
            final_status: None,
        }
    }

    /// Accepted operation tracked through a `Location` URL
    #[must_use]
    pub fn accepted_with_location(status_code: u16, location: String) -> Self {
        Self {
            status_code,
            status_url: Some(location),
            status_url_kind: StatusUrlKind::Location,
            final_status: None,
        }
    }

    #[must_use]
    pub fn with_final_status(mut self, status: OperationStatus) -> Self {
        self.final_status = Some(status);
        self
    }
}

/// Long-running operation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    InProgress,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationState {
    /// Map an ARM status string; anything unrecognised counts as in progress
    #[must_use]
    pub fn from_status(status: &str) -> Self {
        if status.eq_ignore_ascii_case("Succeeded") {
            OperationState::Succeeded
        } else if status.eq_ignore_ascii_case("Failed") {
            OperationState::Failed
        } else if status.eq_ignore_ascii_case("Canceled") || status.eq_ignore_ascii_case("Cancelled") {
            OperationState::Canceled
        } else {
            OperationState::InProgress
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationState::InProgress)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::InProgress => "InProgress",
            OperationState::Succeeded => "Succeeded",
            OperationState::Failed => "Failed",
            OperationState::Canceled => "Canceled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatus {
    pub state: OperationState,
    pub error: Option<String>,
}

/// Wire body of an `Azure-AsyncOperation` status response
#[derive(Debug, Deserialize)]
pub struct OperationStatusBody {
    pub status: String,
    #[serde(default)]
    pub error: Option<ArmErrorDetail>,
}

impl From<OperationStatusBody> for OperationStatus {
    fn from(body: OperationStatusBody) -> Self {
        Self {
            state: OperationState::from_status(&body.status),
            error: body.error.map(|e| format!("{}: {}", e.code, e.message)),
        }
    }
}

/// ARM error envelope: `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct ArmErrorResponse {
    pub error: ArmErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
