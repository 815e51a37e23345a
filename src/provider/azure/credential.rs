//! # Client Certificate Credential
//!
//! Microsoft Entra ID credential that authenticates an application with a
//! certificate, using the OAuth 2.0 client credentials grant and a signed JWT
//! client assertion (RFC 7523).
//!
//! Each credential is scoped to exactly one tenant. Construction is purely
//! local (input validation and signing key setup); the first token request
//! happens on first use and tokens are cached per scope until shortly before
//! they expire.
//!
//! The assertion header carries `x5t#S256` (SHA-256 thumbprint of the leaf
//! certificate) and, when `send_certificate_chain` is set, `x5c` with the
//! full chain so the tenant can validate subject name / issuer trust.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_core::error::ErrorKind;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info_span, Instrument};
use typespec_client_core::time::{Duration, OffsetDateTime};

use super::certificate::ClientCertificate;
use crate::constants::{
    CLIENT_ASSERTION_LIFETIME_SECS, CLIENT_ASSERTION_TYPE, KNOWN_AUTHORITY_HOSTS,
    TOKEN_REFRESH_MARGIN_SECS,
};
use crate::provider::{
    CertificateIdentity, CredentialError, CredentialOptions, CredentialProvider, TenantCredential,
};

/// JWT claims of the client assertion
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    nbf: i64,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Certificate-based credential for one tenant
pub struct ClientCertificateCredential {
    tenant_id: String,
    client_id: String,
    token_endpoint: String,
    encoding_key: EncodingKey,
    thumbprint_s256: String,
    x5c: Option<Vec<String>>,
    http_client: reqwest::Client,
    tokens: Mutex<HashMap<String, AccessToken>>,
}

impl fmt::Debug for ClientCertificateCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCertificateCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("token_endpoint", &self.token_endpoint)
            .finish_non_exhaustive()
    }
}

impl ClientCertificateCredential {
    /// Create a credential scoped to `tenant_id`
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] if the tenant or client ID is invalid,
    /// the authority host is not a known cloud while instance discovery is
    /// enabled, or the private key cannot be used for RSA signing.
    pub fn new(
        tenant_id: &str,
        client_id: &str,
        certificate: &ClientCertificate,
        options: CredentialOptions,
        authority_host: &str,
        http_client: reqwest::Client,
    ) -> Result<Self, CredentialError> {
        validate_tenant_id(tenant_id)?;
        if client_id.trim().is_empty() {
            return Err(CredentialError::MissingClientId);
        }
        if certificate.chain().is_empty() {
            return Err(CredentialError::EmptyCertificateChain);
        }

        let authority_host = authority_host.trim_end_matches('/');
        if !options.disable_instance_discovery
            && !KNOWN_AUTHORITY_HOSTS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(authority_host))
        {
            return Err(CredentialError::UnknownAuthority(authority_host.to_string()));
        }

        let encoding_key = EncodingKey::from_rsa_pem(certificate.private_key_pem().as_bytes())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        let x5c = options.send_certificate_chain.then(|| {
            certificate
                .chain()
                .iter()
                .map(|der| STANDARD.encode(der))
                .collect()
        });

        Ok(Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            token_endpoint: format!("{authority_host}/{tenant_id}/oauth2/v2.0/token"),
            encoding_key,
            thumbprint_s256: URL_SAFE_NO_PAD.encode(Sha256::digest(certificate.leaf())),
            x5c,
            http_client,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Sign a fresh client assertion
    ///
    /// # Errors
    ///
    /// Returns the signing error from `jsonwebtoken`.
    pub fn client_assertion(&self) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            aud: &self.token_endpoint,
            iss: &self.client_id,
            sub: &self.client_id,
            jti: uuid::Uuid::new_v4().to_string(),
            nbf: now,
            iat: now,
            exp: now + CLIENT_ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::PS256);
        header.x5t_s256 = Some(self.thumbprint_s256.clone());
        header.x5c.clone_from(&self.x5c);

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
    }

    async fn request_token(&self, scope: &str) -> azure_core::Result<AccessToken> {
        let assertion = self
            .client_assertion()
            .map_err(|e| credential_error(format!("failed to sign client assertion: {e}")))?;

        let form = [
            ("client_id", self.client_id.as_str()),
            ("scope", scope),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                credential_error(format!("token request to {} failed: {e}", self.token_endpoint))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            return Err(credential_error(format!(
                "token endpoint for tenant {} returned HTTP {}: {} {}",
                self.tenant_id,
                status.as_u16(),
                detail.error,
                detail.error_description
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| credential_error(format!("failed to decode token response: {e}")))?;

        Ok(AccessToken::new(
            Secret::new(token.access_token),
            OffsetDateTime::now_utc() + Duration::seconds(token.expires_in),
        ))
    }
}

#[async_trait]
impl TokenCredential for ClientCertificateCredential {
    async fn get_token(
        &self,
        scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        let scope = scopes.join(" ");
        let span = info_span!("azure.credential.get_token", tenant.id = %self.tenant_id);

        async move {
            let mut tokens = self.tokens.lock().await;
            let refresh_at = OffsetDateTime::now_utc() + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
            if let Some(cached) = tokens.get(&scope) {
                if cached.expires_on > refresh_at {
                    return Ok(cached.clone());
                }
            }

            debug!("Requesting access token for scope {}", scope);
            let token = self.request_token(&scope).await?;
            tokens.insert(scope, token.clone());
            Ok(token)
        }
        .instrument(span)
        .await
    }
}

fn credential_error(message: String) -> azure_core::Error {
    azure_core::Error::new(ErrorKind::Credential, message)
}

/// Tenant IDs may contain ASCII alphanumerics, `-` and `.` only
///
/// # Errors
///
/// Returns [`CredentialError::InvalidTenantId`] otherwise.
pub fn validate_tenant_id(tenant_id: &str) -> Result<(), CredentialError> {
    if tenant_id.is_empty() {
        return Err(CredentialError::InvalidTenantId {
            tenant_id: tenant_id.to_string(),
            reason: "tenant ID is empty".to_string(),
        });
    }
    if let Some(c) = tenant_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '.'))
    {
        return Err(CredentialError::InvalidTenantId {
            tenant_id: tenant_id.to_string(),
            reason: format!("invalid character {c:?}"),
        });
    }
    Ok(())
}

/// Builds [`ClientCertificateCredential`]s against a fixed authority host
#[derive(Debug, Clone)]
pub struct AzureCredentialProvider {
    authority_host: String,
    http_client: reqwest::Client,
}

impl AzureCredentialProvider {
    #[must_use]
    pub fn new(authority_host: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            authority_host: authority_host.into(),
            http_client,
        }
    }
}

impl CredentialProvider for AzureCredentialProvider {
    fn build(
        &self,
        tenant_id: &str,
        identity: &CertificateIdentity,
        options: CredentialOptions,
    ) -> Result<TenantCredential, CredentialError> {
        let credential = ClientCertificateCredential::new(
            tenant_id,
            &identity.client_id,
            &identity.certificate,
            options,
            &self.authority_host,
            self.http_client.clone(),
        )?;
        Ok(Arc::new(credential))
    }
}
