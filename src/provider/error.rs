//! # Provider Errors
//!
//! Error types surfaced by credential construction and the resource manager
//! client. Both are captured per record by the batch runner.

use thiserror::Error;

/// Tenant credential construction failed
///
/// `Clone` so the cache can hand the same failure to every immediately
/// following record of the tenant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("invalid tenant ID {tenant_id:?}: {reason}")]
    InvalidTenantId { tenant_id: String, reason: String },
    #[error("client ID must not be empty")]
    MissingClientId,
    #[error("certificate chain is empty")]
    EmptyCertificateChain,
    #[error("failed to load private key: {0}")]
    InvalidKey(String),
    #[error("authority host {0:?} is not a known cloud; disable instance discovery to use a custom authority")]
    UnknownAuthority(String),
}

/// Azure Resource Manager call failed
#[derive(Debug, Error)]
pub enum ArmError {
    #[error("failed to acquire access token: {0}")]
    Token(String),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned HTTP {status} ({code}): {message}")]
    Status {
        operation: &'static str,
        status: u16,
        code: String,
        message: String,
    },
    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid resource manager endpoint {0}")]
    InvalidEndpoint(String),
    #[error("subscription ID must not be empty")]
    MissingSubscription,
    #[error("operation has no status URL to poll")]
    NoStatusUrl,
}

impl ArmError {
    /// HTTP status code when the service answered with an error
    pub fn status(&self) -> Option<u16> {
        match self {
            ArmError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// ARM error code when the service answered with an error body
    pub fn code(&self) -> Option<&str> {
        match self {
            ArmError::Status { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}
