//! # Normalization Policy
//!
//! Decides from a freshly fetched cluster whether an update is needed, and
//! what the update body is.
//!
//! The only built-in policy is [`SystemAssignedIdentityPolicy`]: clusters that
//! already use a system-assigned identity are re-submitted with every other
//! observed field copied forward, which normalizes drift in how the identity
//! is represented. Clusters without an identity, or with a user-assigned one,
//! are left alone.

use crate::constants::SYSTEM_ASSIGNED_IDENTITY;
use crate::controller::types::SkipReason;
use crate::provider::azure::models::{ClusterUpdate, ManagedCluster};

/// Verdict for one cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Submit the desired state
    Apply,
    /// Already in the desired state, nothing to submit
    InSync,
    /// Outside the scope of this policy
    NotApplicable(SkipReason),
}

pub trait NormalizationPolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn evaluate(&self, cluster: &ManagedCluster) -> PolicyDecision;

    /// Update body built only from the observed cluster
    fn desired_state(&self, cluster: &ManagedCluster) -> ClusterUpdate;
}

/// Re-submit system-assigned clusters with `identity.type = SystemAssigned`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAssignedIdentityPolicy;

impl NormalizationPolicy for SystemAssignedIdentityPolicy {
    fn name(&self) -> &'static str {
        "system-assigned-identity"
    }

    fn evaluate(&self, cluster: &ManagedCluster) -> PolicyDecision {
        match cluster.identity_type() {
            Some(kind) if kind.eq_ignore_ascii_case(SYSTEM_ASSIGNED_IDENTITY) => {
                PolicyDecision::Apply
            }
            _ => PolicyDecision::NotApplicable(SkipReason::IdentityMismatch),
        }
    }

    fn desired_state(&self, cluster: &ManagedCluster) -> ClusterUpdate {
        ClusterUpdate::system_assigned_from(cluster)
    }
}
