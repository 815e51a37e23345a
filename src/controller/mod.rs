//! # Controller
//!
//! Batch reconciliation of managed cluster identities.
//!
//! - `backoff`: Fibonacci backoff between operation status polls
//! - `credential_cache`: size-one tenant credential cache
//! - `policy`: decides whether a cluster needs an update
//! - `reconciler`: reconciles one cluster
//! - `runner`: drives a batch of records, sequentially or per tenant
//! - `types`: records and outcomes

pub mod backoff;
pub mod credential_cache;
pub mod policy;
pub mod reconciler;
pub mod runner;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use credential_cache::CredentialCache;
pub use policy::{NormalizationPolicy, PolicyDecision, SystemAssignedIdentityPolicy};
pub use reconciler::ClusterReconciler;
pub use runner::BatchRunner;
pub use types::{
    ReconcileError, ReconcileOutcome, RecordOutcome, RecordReport, ResourceRecord, SkipReason,
};
