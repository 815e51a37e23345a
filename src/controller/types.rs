//! # Controller Types
//!
//! Records flowing into the batch and the outcomes flowing out of it.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::provider::azure::models::{OperationState, SubmittedOperation};
use crate::provider::{ArmError, CredentialError};
use crate::resource_id::ParseError;

/// One input row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// 1-based line in the input source
    pub line: u64,
    pub resource_path: String,
    pub tenant_id: String,
}

impl ResourceRecord {
    #[must_use]
    pub fn new(line: u64, resource_path: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            line,
            resource_path: resource_path.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// Why a cluster was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The cluster's identity is absent or not the one the policy normalizes
    IdentityMismatch,
    /// An update was required but mutating calls are disabled
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::IdentityMismatch => f.write_str("identity-mismatch"),
            SkipReason::DryRun => f.write_str("dry-run"),
        }
    }
}

/// Failure while reconciling one cluster
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to create managed cluster client: {0}")]
    Client(#[source] ArmError),
    #[error("failed to get cluster: {0}")]
    Get(#[source] ArmError),
    #[error("failed to submit update: {0}")]
    Submit(#[source] ArmError),
    #[error("failed to poll update status: {0}")]
    Poll(#[source] ArmError),
    #[error("update finished as {state}{}", detail_suffix(.message.as_deref()))]
    Operation {
        state: OperationState,
        message: Option<String>,
    },
    #[error("update did not finish within {0:?}")]
    OperationTimeout(Duration),
}

fn detail_suffix(message: Option<&str>) -> String {
    message.map(|m| format!(": {m}")).unwrap_or_default()
}

/// Result of reconciling one cluster
#[derive(Debug)]
pub enum ReconcileOutcome {
    Unchanged,
    Updated(SubmittedOperation),
    Skipped(SkipReason),
    Failed(ReconcileError),
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Updated(_) => "updated",
            ReconcileOutcome::Skipped(SkipReason::IdentityMismatch) => "skipped_identity_mismatch",
            ReconcileOutcome::Skipped(SkipReason::DryRun) => "skipped_dry_run",
            ReconcileOutcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Unchanged => f.write_str("unchanged"),
            ReconcileOutcome::Updated(operation) => match &operation.final_status {
                Some(status) => write!(f, "updated ({})", status.state),
                None => write!(f, "updated (accepted with HTTP {})", operation.status_code),
            },
            ReconcileOutcome::Skipped(reason) => write!(f, "skipped ({reason})"),
            ReconcileOutcome::Failed(error) => write!(f, "failed: {error}"),
        }
    }
}

/// Exactly one per input record
#[derive(Debug)]
pub enum RecordOutcome {
    Reconciled(ReconcileOutcome),
    MalformedResourceId(ParseError),
    Credential(CredentialError),
    /// Not processed because the run was cancelled
    Cancelled,
    /// The worker handling this record terminated before reporting
    Aborted(String),
}

impl RecordOutcome {
    /// Stable label used for metrics and the audit report
    pub fn label(&self) -> &'static str {
        match self {
            RecordOutcome::Reconciled(outcome) => outcome.label(),
            RecordOutcome::MalformedResourceId(_) => "malformed_resource_id",
            RecordOutcome::Credential(_) => "credential_error",
            RecordOutcome::Cancelled => "cancelled",
            RecordOutcome::Aborted(_) => "aborted",
        }
    }

    pub fn is_failure(&self) -> bool {
        match self {
            RecordOutcome::Reconciled(outcome) => matches!(outcome, ReconcileOutcome::Failed(_)),
            RecordOutcome::MalformedResourceId(_)
            | RecordOutcome::Credential(_)
            | RecordOutcome::Aborted(_) => true,
            RecordOutcome::Cancelled => false,
        }
    }

    pub fn reconcile_outcome(&self) -> Option<&ReconcileOutcome> {
        match self {
            RecordOutcome::Reconciled(outcome) => Some(outcome),
            _ => None,
        }
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordOutcome::Reconciled(outcome) => outcome.fmt(f),
            RecordOutcome::MalformedResourceId(error) => write!(f, "failed: {error}"),
            RecordOutcome::Credential(error) => write!(f, "failed: credential error: {error}"),
            RecordOutcome::Cancelled => f.write_str("cancelled"),
            RecordOutcome::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

/// A record together with its outcome
#[derive(Debug)]
pub struct RecordReport {
    pub record: ResourceRecord,
    pub outcome: RecordOutcome,
}
