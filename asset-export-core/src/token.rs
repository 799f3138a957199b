//! Credential cache and the two identity-provider flows.
//!
//! Tokens are cached in the shared persisted [`StateStore`] so separately
//! scheduled invocations reuse them. An entry is written with
//! `ttl = round(expires_in * 0.95)`, keeping a 5% safety margin so a token
//! is never handed out close to its real expiry. Refreshes are single-flight
//! per cache key: concurrent callers that miss together elect one exchange
//! and the rest reuse its result.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::contract::{IdentityProvider, StateStore, TokenResponse};
use crate::error::ExportError;

pub struct TokenCache {
    store: Arc<dyn StateStore>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TokenCache {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Return a valid bearer token for the provider, exchanging credentials
    /// only on a cache miss. Exchange failure is fatal; there is no retry
    /// inside this component.
    pub async fn get_token(&self, provider: &dyn IdentityProvider) -> Result<String, ExportError> {
        let key = provider.cache_key();
        if let Some(token) = self.lookup(&key).await? {
            debug!(key, "access token served from cache");
            return Ok(token);
        }

        let gate = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().await;

        // A concurrent caller may have refreshed while we waited on the gate.
        if let Some(token) = self.lookup(&key).await? {
            debug!(key, "access token refreshed by concurrent caller");
            return Ok(token);
        }

        let TokenResponse {
            access_token,
            expires_in,
        } = provider.exchange().await?;
        let ttl_secs = (expires_in as f64 * 0.95).round() as u64;
        self.store
            .put(&key, serde_json::Value::String(access_token.clone()), Some(ttl_secs))
            .await
            .map_err(|e| ExportError::Credential(format!("failed to persist token for {key}: {e}")))?;
        info!(key, ttl_secs, "cached fresh access token");
        Ok(access_token)
    }

    async fn lookup(&self, key: &str) -> Result<Option<String>, ExportError> {
        let value = self
            .store
            .get(key)
            .await
            .map_err(|e| ExportError::Credential(format!("token cache read failed for {key}: {e}")))?;
        Ok(match value {
            Some(serde_json::Value::String(token)) => Some(token),
            _ => None,
        })
    }
}

/// Service credentials for repository access, exchanged at the provider's
/// token endpoint.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RepositoryCredentials {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub technical_account_id: String,
    pub org_id: String,
}

/// Repository-side identity flow: POSTs the service credentials to the
/// token endpoint and reads back `{access_token, expires_in}`.
pub struct RepositoryAuth {
    http: reqwest::Client,
    credentials: RepositoryCredentials,
}

impl RepositoryAuth {
    pub fn new(http: reqwest::Client, credentials: RepositoryCredentials) -> Self {
        Self { http, credentials }
    }
}

#[derive(Debug, serde::Deserialize)]
struct RepositoryTokenBody {
    access_token: String,
    /// The repository's token endpoint reports expiry in milliseconds.
    expires_in: u64,
}

#[async_trait]
impl IdentityProvider for RepositoryAuth {
    fn cache_key(&self) -> String {
        format!("repository-access-token-{}", self.credentials.client_id)
    }

    async fn exchange(&self) -> Result<TokenResponse, ExportError> {
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            (
                "technical_account_id",
                self.credentials.technical_account_id.as_str(),
            ),
            ("org_id", self.credentials.org_id.as_str()),
        ];
        let response = self
            .http
            .post(&self.credentials.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| ExportError::Credential(format!("repository token exchange failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            error!(%status, endpoint = %self.credentials.token_endpoint, "repository token endpoint returned error");
            return Err(ExportError::Credential(format!(
                "repository token endpoint returned {status}"
            )));
        }
        let body: RepositoryTokenBody = response.json().await.map_err(|e| {
            ExportError::Credential(format!("malformed repository token response: {e}"))
        })?;
        info!(expires_in_ms = body.expires_in, "exchanged repository service credentials for token");
        Ok(TokenResponse {
            access_token: body.access_token,
            expires_in: body.expires_in / 1_000,
        })
    }
}

/// Destination-platform identity flow: `client_credentials` grant against
/// the platform's identity service, as used by the marketing connector.
pub struct ClientCredentialsAuth {
    http: reqwest::Client,
    rest_host: String,
    client_id: String,
    client_secret: String,
}

impl ClientCredentialsAuth {
    pub fn new(
        http: reqwest::Client,
        rest_host: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            rest_host,
            client_id,
            client_secret,
        }
    }
}

#[derive(Debug, serde::Deserialize)]
struct ClientCredentialsBody {
    access_token: String,
    /// Seconds.
    expires_in: u64,
}

#[async_trait]
impl IdentityProvider for ClientCredentialsAuth {
    fn cache_key(&self) -> String {
        format!("marketing-access-token-{}", self.client_id)
    }

    async fn exchange(&self) -> Result<TokenResponse, ExportError> {
        let endpoint = format!(
            "{}/identity/oauth/token",
            self.rest_host.trim_end_matches('/')
        );
        let response = self
            .http
            .get(&endpoint)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ExportError::Credential(format!("destination token exchange failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            error!(%status, endpoint = %endpoint, "destination identity service returned error");
            return Err(ExportError::Credential(format!(
                "destination identity service returned {status}"
            )));
        }
        let body: ClientCredentialsBody = response.json().await.map_err(|e| {
            ExportError::Credential(format!("malformed destination token response: {e}"))
        })?;
        info!(expires_in = body.expires_in, "exchanged destination client credentials for token");
        Ok(TokenResponse {
            access_token: body.access_token,
            expires_in: body.expires_in,
        })
    }
}
