//! Marketing-asset connector: uploads an asset into a folder of the
//! marketing platform's asset API. Owns its own identity flow (client
//! credentials against the platform's identity service), independent of the
//! repository token.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::contract::{Connector, ExportOutcome};
use crate::error::ExportError;
use crate::repository::RepositoryClient;
use crate::token::{ClientCredentialsAuth, TokenCache};

pub const DESTINATION_ID: &str = "marketing";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MarketingConfig {
    /// REST host of the platform, e.g. `https://0000-XYZ.mktorest.example.com`.
    pub rest_host: String,
    /// Target folder the uploaded files are created in.
    pub folder_id: i64,
    pub client_id: String,
    pub client_secret: String,
}

pub struct MarketingConnector {
    http: reqwest::Client,
    config: MarketingConfig,
    repository: Arc<RepositoryClient>,
    token: String,
}

impl MarketingConnector {
    /// Acquires the destination-side bearer token through the shared cache.
    pub async fn initialize(
        http: reqwest::Client,
        config: MarketingConfig,
        repository: Arc<RepositoryClient>,
        tokens: Arc<TokenCache>,
    ) -> Result<Self, ExportError> {
        let auth = ClientCredentialsAuth::new(
            http.clone(),
            config.rest_host.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
        );
        let token = tokens.get_token(&auth).await?;
        Ok(Self {
            http,
            config,
            repository,
            token,
        })
    }
}

#[async_trait]
impl Connector for MarketingConnector {
    async fn export(&self, asset_path: &str) -> Result<ExportOutcome, ExportError> {
        let source = self.repository.stream_asset(asset_path).await?;
        let bytes_written = source.content_length();
        let file_name = asset_path.rsplit('/').next().unwrap_or(asset_path).to_string();

        let folder = serde_json::json!({
            "id": self.config.folder_id,
            "type": "Folder"
        })
        .to_string();
        let file_part =
            reqwest::multipart::Part::stream(reqwest::Body::wrap_stream(source.bytes_stream()))
                .file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .text("folder", folder)
            .part("file", file_part)
            .text("name", file_name.clone());

        let endpoint = format!(
            "{}/rest/asset/v1/files.json",
            self.config.rest_host.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExportError::ConnectorExport {
                asset_path: asset_path.to_string(),
                reason: format!("file upload failed: {e}"),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::ConnectorExport {
                asset_path: asset_path.to_string(),
                reason: format!("marketing asset API returned {status}"),
            });
        }
        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ExportError::ConnectorExport {
                    asset_path: asset_path.to_string(),
                    reason: format!("malformed upload response: {e}"),
                })?;
        let remote_id = body
            .pointer("/result/0/id")
            .and_then(|v| v.as_i64())
            .map(|id| id.to_string());

        info!(
            asset = asset_path,
            folder_id = self.config.folder_id,
            file = %file_name,
            remote_id = ?remote_id,
            "asset uploaded to marketing platform"
        );
        Ok(ExportOutcome {
            destination_id: DESTINATION_ID.to_string(),
            bytes_written,
            remote_id,
        })
    }
}
