//! # Configuration
//!
//! Runtime settings loaded from environment variables, and the immutable
//! [`BatchConfig`] handed to the batch runner.
//!
//! Nothing in the reconciliation loop reads process-wide flags. `main` builds
//! a [`BatchConfig`] once from the CLI and [`RuntimeConfig`] and passes it
//! down by value.

use std::time::Duration;

use crate::constants::{
    DEFAULT_ARM_ENDPOINT, DEFAULT_AUTHORITY_HOST, DEFAULT_MANAGED_CLUSTERS_API_VERSION,
    DEFAULT_MAX_PARALLEL_TENANTS, DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MAX_SECS,
    DEFAULT_POLL_INTERVAL_MIN_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Process-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Azure Resource Manager endpoint (ARM_ENDPOINT)
    pub arm_endpoint: String,
    /// Microsoft Entra ID authority host (AUTHORITY_HOST)
    pub authority_host: String,
    /// managedClusters API version (MANAGED_CLUSTERS_API_VERSION)
    pub managed_clusters_api_version: String,
    /// Per-request timeout in seconds (REQUEST_TIMEOUT_SECS)
    pub request_timeout_secs: u64,
    /// Deadline for a tracked long-running operation in seconds (OPERATION_TIMEOUT_SECS)
    pub operation_timeout_secs: u64,
    /// First poll interval in seconds (POLL_INTERVAL_MIN_SECS)
    pub poll_interval_min_secs: u64,
    /// Maximum poll interval in seconds (POLL_INTERVAL_MAX_SECS)
    pub poll_interval_max_secs: u64,
    /// Number of tenant workers (MAX_PARALLEL_TENANTS)
    pub max_parallel_tenants: usize,
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            arm_endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            managed_clusters_api_version: DEFAULT_MANAGED_CLUSTERS_API_VERSION.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            poll_interval_min_secs: DEFAULT_POLL_INTERVAL_MIN_SECS,
            poll_interval_max_secs: DEFAULT_POLL_INTERVAL_MAX_SECS,
            max_parallel_tenants: DEFAULT_MAX_PARALLEL_TENANTS,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            log_enable_color: true,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            arm_endpoint: env_var_or_default_str("ARM_ENDPOINT", DEFAULT_ARM_ENDPOINT),
            authority_host: env_var_or_default_str("AUTHORITY_HOST", DEFAULT_AUTHORITY_HOST),
            managed_clusters_api_version: env_var_or_default_str(
                "MANAGED_CLUSTERS_API_VERSION",
                DEFAULT_MANAGED_CLUSTERS_API_VERSION,
            ),
            request_timeout_secs: env_var_or_default(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            operation_timeout_secs: env_var_or_default(
                "OPERATION_TIMEOUT_SECS",
                DEFAULT_OPERATION_TIMEOUT_SECS,
            ),
            poll_interval_min_secs: env_var_or_default(
                "POLL_INTERVAL_MIN_SECS",
                DEFAULT_POLL_INTERVAL_MIN_SECS,
            ),
            poll_interval_max_secs: env_var_or_default(
                "POLL_INTERVAL_MAX_SECS",
                DEFAULT_POLL_INTERVAL_MAX_SECS,
            ),
            max_parallel_tenants: env_var_or_default(
                "MAX_PARALLEL_TENANTS",
                DEFAULT_MAX_PARALLEL_TENANTS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", true),
        }
    }

    /// Get per-request timeout duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Immutable settings for one batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Inspect only; never issue a mutating call
    pub dry_run: bool,
    /// Track each submitted update until it reaches a terminal state
    pub wait_for_completion: bool,
    /// Number of tenant workers; 1 keeps the loop strictly sequential
    pub max_parallel_tenants: usize,
    /// Deadline for a tracked operation
    pub operation_timeout: Duration,
    /// First poll interval
    pub poll_interval_min: Duration,
    /// Poll interval cap
    pub poll_interval_max: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            wait_for_completion: false,
            max_parallel_tenants: DEFAULT_MAX_PARALLEL_TENANTS,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            poll_interval_min: Duration::from_secs(DEFAULT_POLL_INTERVAL_MIN_SECS),
            poll_interval_max: Duration::from_secs(DEFAULT_POLL_INTERVAL_MAX_SECS),
        }
    }
}

impl BatchConfig {
    /// Build a batch configuration from runtime settings
    ///
    /// `max_parallel_tenants` is clamped to at least one worker and the first
    /// poll interval to at least one second, so a zero setting cannot turn
    /// completion tracking into a busy loop.
    #[must_use]
    pub fn from_runtime(runtime: &RuntimeConfig, dry_run: bool, wait_for_completion: bool) -> Self {
        let poll_min_secs = runtime.poll_interval_min_secs.max(1);
        Self {
            dry_run,
            wait_for_completion,
            max_parallel_tenants: runtime.max_parallel_tenants.max(1),
            operation_timeout: Duration::from_secs(runtime.operation_timeout_secs),
            poll_interval_min: Duration::from_secs(poll_min_secs),
            poll_interval_max: Duration::from_secs(runtime.poll_interval_max_secs.max(poll_min_secs)),
        }
    }

    /// Whether records are dispatched to concurrent tenant workers
    pub fn is_parallel(&self) -> bool {
        self.max_parallel_tenants > 1
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
