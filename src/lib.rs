//! # Cluster Identity Remediator
//!
//! Batch tool that normalizes the managed identity of Azure Kubernetes Service
//! clusters across many tenants.
//!
//! ## Overview
//!
//! For every `(resource path, tenant)` record the remediator:
//!
//! 1. **Parses the resource path** into subscription, resource group and cluster name
//! 2. **Authenticates in the tenant** with a client certificate, reusing the
//!    credential while consecutive records share a tenant
//! 3. **Fetches the cluster** and asks the normalization policy whether it needs an update
//! 4. **Submits the update** unless running in dry-run mode, optionally
//!    tracking the long-running operation to completion
//!
//! Each record yields exactly one outcome. A failure in one record never stops
//! the batch.
//!
//! ## Modules
//!
//! - `resource_id`: resource path parsing
//! - `controller`: credential cache, reconciler, batch runner
//! - `provider`: seams to Azure and their implementations
//! - `input`: CSV records
//! - `report`: run summary and audit report
//! - `observability`: logging and metrics
//! - `config`: runtime and batch configuration

pub mod cli;
pub mod config;
pub mod constants;
pub mod controller;
pub mod input;
pub mod observability;
pub mod provider;
pub mod report;
pub mod resource_id;

pub use config::{BatchConfig, RuntimeConfig};
pub use controller::{
    BatchRunner, ClusterReconciler, CredentialCache, ReconcileError, ReconcileOutcome,
    RecordOutcome, RecordReport, ResourceRecord, SkipReason,
};
pub use provider::{
    ArmError, CertificateIdentity, ClusterClientFactory, CredentialError, CredentialOptions,
    CredentialProvider, ManagedClusterApi, TenantCredential,
};
pub use resource_id::{parse_resource_id, ParseError, ParsedResourceId};
