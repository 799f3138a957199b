//! Streams asset bytes out of the repository for connectors to forward to
//! their destination.

use std::sync::Arc;

use tracing::debug;

use crate::error::ExportError;
use crate::token::{RepositoryAuth, TokenCache};

pub struct RepositoryClient {
    http: reqwest::Client,
    host: String,
    auth: Arc<RepositoryAuth>,
    tokens: Arc<TokenCache>,
}

impl RepositoryClient {
    pub fn new(
        http: reqwest::Client,
        host: String,
        auth: Arc<RepositoryAuth>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            http,
            host,
            auth,
            tokens,
        }
    }

    /// Open a streaming download of the asset. The returned response's byte
    /// stream is forwarded by connectors without buffering the whole body.
    pub async fn stream_asset(&self, asset_path: &str) -> Result<reqwest::Response, ExportError> {
        let token = self.tokens.get_token(self.auth.as_ref()).await?;
        let url = format!("{}{}", self.host, asset_path);
        debug!(url = %url, "downloading asset from repository");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ExportError::ConnectorExport {
                asset_path: asset_path.to_string(),
                reason: format!("asset download failed: {e}"),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::ConnectorExport {
                asset_path: asset_path.to_string(),
                reason: format!("repository returned {status} for asset download"),
            });
        }
        Ok(response)
    }
}
