//! # Constants
//!
//! Shared constants used throughout the remediator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default Azure Resource Manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Default Microsoft Entra ID authority host
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Default `Microsoft.ContainerService/managedClusters` API version
pub const DEFAULT_MANAGED_CLUSTERS_API_VERSION: &str = "2024-09-01";

/// Default per-request timeout for remote calls (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 180;

/// Default deadline for a tracked long-running operation (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 180;

/// Default first poll interval when tracking an operation (seconds)
pub const DEFAULT_POLL_INTERVAL_MIN_SECS: u64 = 1;

/// Default maximum poll interval when tracking an operation (seconds)
pub const DEFAULT_POLL_INTERVAL_MAX_SECS: u64 = 10;

/// Default number of tenant workers (1 = strictly sequential)
pub const DEFAULT_MAX_PARALLEL_TENANTS: usize = 1;

/// Identity type marker for platform-managed identities
pub const SYSTEM_ASSIGNED_IDENTITY: &str = "SystemAssigned";

/// OAuth 2.0 client assertion type for JWT bearer assertions (RFC 7523)
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a signed client assertion (seconds)
pub const CLIENT_ASSERTION_LIFETIME_SECS: i64 = 600;

/// Cached access tokens are refreshed when they expire within this window (seconds)
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Authority hosts that are accepted when instance discovery is enabled
pub const KNOWN_AUTHORITY_HOSTS: &[&str] = &[
    "https://login.microsoftonline.com",
    "https://login.microsoftonline.us",
    "https://login.chinacloudapi.cn",
];

/// Target for the default log filter
pub const LOG_TARGET: &str = "cluster_identity_remediator";
