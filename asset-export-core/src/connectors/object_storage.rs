//! Object-storage connector: streams an asset into a blob container.
//!
//! Exported objects land under a fixed root prefix inside the container,
//! keyed by the asset's repository path. Authentication uses a pre-signed
//! access token appended to the blob URL, so no destination-side token
//! exchange is needed at initialisation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::contract::{Connector, ExportOutcome};
use crate::error::ExportError;
use crate::repository::RepositoryClient;

pub const DESTINATION_ID: &str = "object-storage";

/// Container prefix all exported assets are written under.
const EXPORT_ROOT: &str = "exported-assets";

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ObjectStorageConfig {
    /// Blob service endpoint, e.g. `https://account.blob.example.net`.
    pub endpoint: String,
    pub container: String,
    /// Pre-signed access token, appended to the blob URL as a query string.
    pub sas_token: String,
}

pub struct ObjectStorageConnector {
    http: reqwest::Client,
    config: ObjectStorageConfig,
    repository: Arc<RepositoryClient>,
}

impl ObjectStorageConnector {
    pub async fn initialize(
        http: reqwest::Client,
        config: ObjectStorageConfig,
        repository: Arc<RepositoryClient>,
    ) -> Result<Self, ExportError> {
        Ok(Self {
            http,
            config,
            repository,
        })
    }

    fn blob_url(&self, asset_path: &str) -> String {
        format!(
            "{}/{}/{}{}?{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.container,
            EXPORT_ROOT,
            asset_path,
            self.config.sas_token
        )
    }
}

#[async_trait]
impl Connector for ObjectStorageConnector {
    async fn export(&self, asset_path: &str) -> Result<ExportOutcome, ExportError> {
        let source = self.repository.stream_asset(asset_path).await?;
        let bytes_written = source.content_length();

        let url = self.blob_url(asset_path);
        let mut request = self
            .http
            .put(&url)
            .header("x-ms-blob-type", "BlockBlob")
            .body(reqwest::Body::wrap_stream(source.bytes_stream()));
        if let Some(len) = bytes_written {
            request = request.header(reqwest::header::CONTENT_LENGTH, len);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExportError::ConnectorExport {
                asset_path: asset_path.to_string(),
                reason: format!("blob upload failed: {e}"),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::ConnectorExport {
                asset_path: asset_path.to_string(),
                reason: format!("blob store returned {status}"),
            });
        }

        let remote_id = format!(
            "{}/{}/{}{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.container,
            EXPORT_ROOT,
            asset_path
        );
        info!(asset = asset_path, blob = %remote_id, bytes = bytes_written, "asset streamed to object storage");
        Ok(ExportOutcome {
            destination_id: DESTINATION_ID.to_string(),
            bytes_written,
            remote_id: Some(remote_id),
        })
    }
}
