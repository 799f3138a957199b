//! Destination connectors and their registry.
//!
//! The registry is the single dispatch point from a destination id (as
//! carried in an asset's export directive) to an initialised [`Connector`].
//! Adding a destination kind means adding a module here plus one arm in
//! [`ConnectorRegistry::create`]; the consumer loop never changes.

pub mod marketing;
pub mod object_storage;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::contract::{Connector, ConnectorProvider};
use crate::error::ExportError;
use crate::repository::RepositoryClient;
use crate::token::TokenCache;

pub use marketing::{MarketingConfig, MarketingConnector};
pub use object_storage::{ObjectStorageConfig, ObjectStorageConnector};

/// Destination-specific credential sections. A section left unset simply
/// means that destination is not configured for this invocation; referencing
/// it from a directive is then a configuration error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationsConfig {
    pub object_storage: Option<ObjectStorageConfig>,
    pub marketing: Option<MarketingConfig>,
}

pub struct ConnectorRegistry {
    http: reqwest::Client,
    repository: Arc<RepositoryClient>,
    tokens: Arc<TokenCache>,
    destinations: DestinationsConfig,
}

impl ConnectorRegistry {
    pub fn new(
        http: reqwest::Client,
        repository: Arc<RepositoryClient>,
        tokens: Arc<TokenCache>,
        destinations: DestinationsConfig,
    ) -> Self {
        Self {
            http,
            repository,
            tokens,
            destinations,
        }
    }
}

#[async_trait]
impl ConnectorProvider for ConnectorRegistry {
    async fn create(&self, destination_id: &str) -> Result<Box<dyn Connector>, ExportError> {
        match destination_id {
            object_storage::DESTINATION_ID => {
                let config = self.destinations.object_storage.as_ref().ok_or_else(|| {
                    ExportError::Config(
                        "destination 'object-storage' referenced but its credentials are not configured"
                            .to_string(),
                    )
                })?;
                let connector = ObjectStorageConnector::initialize(
                    self.http.clone(),
                    config.clone(),
                    self.repository.clone(),
                )
                .await?;
                Ok(Box::new(connector))
            }
            marketing::DESTINATION_ID => {
                let config = self.destinations.marketing.as_ref().ok_or_else(|| {
                    ExportError::Config(
                        "destination 'marketing' referenced but its credentials are not configured"
                            .to_string(),
                    )
                })?;
                let connector = MarketingConnector::initialize(
                    self.http.clone(),
                    config.clone(),
                    self.repository.clone(),
                    self.tokens.clone(),
                )
                .await?;
                Ok(Box::new(connector))
            }
            other => {
                warn!(destination = other, "unknown export destination");
                Err(ExportError::UnknownDestination(other.to_string()))
            }
        }
    }
}
