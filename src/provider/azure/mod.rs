//! # Azure Providers
//!
//! - `certificate`: PEM bundle loading
//! - `credential`: certificate-based Entra ID credential
//! - `managed_clusters`: resource manager client for managed clusters
//! - `models`: wire types

pub mod certificate;
pub mod credential;
pub mod managed_clusters;
pub mod models;

pub use certificate::ClientCertificate;
pub use credential::{AzureCredentialProvider, ClientCertificateCredential};
pub use managed_clusters::{ArmClientConfig, AzureClusterClientFactory, ManagedClustersClient};
