//! Wires configuration into a runnable pipeline: state store, token cache,
//! journal and metadata clients, connector registry and the consumer loop.

use std::sync::Arc;

use crate::config::ExportConfig;
use crate::connectors::ConnectorRegistry;
use crate::consume::{self, ConsumeReport, EventOutcome, JournalConsumer};
use crate::contract::{ConnectorProvider, DirectiveResolver, JournalClient, StateStore, SystemClock};
use crate::error::ExportError;
use crate::journal::HttpJournalClient;
use crate::metadata::HttpDirectiveResolver;
use crate::position::{consumer_key, PositionStore};
use crate::repository::RepositoryClient;
use crate::state::FsStateStore;
use crate::token::{RepositoryAuth, TokenCache};

pub struct Pipeline {
    consumer: JournalConsumer,
    resolver: Arc<dyn DirectiveResolver>,
    connectors: Arc<dyn ConnectorProvider>,
    content_root: String,
}

impl Pipeline {
    pub fn from_config(config: ExportConfig) -> Result<Self, ExportError> {
        config.validate()?;
        config.trace_loaded();

        let http = reqwest::Client::new();
        let store: Arc<dyn StateStore> = Arc::new(
            FsStateStore::new(&config.state_dir, Arc::new(SystemClock)).map_err(|e| {
                ExportError::Config(format!(
                    "cannot open state directory {}: {e}",
                    config.state_dir.display()
                ))
            })?,
        );
        let tokens = Arc::new(TokenCache::new(store.clone()));
        let auth = Arc::new(RepositoryAuth::new(
            http.clone(),
            config.repository.credentials.clone(),
        ));
        let repository = Arc::new(RepositoryClient::new(
            http.clone(),
            config.repository.host.clone(),
            auth.clone(),
            tokens.clone(),
        ));
        let resolver: Arc<dyn DirectiveResolver> = Arc::new(HttpDirectiveResolver::new(
            http.clone(),
            config.repository.host.clone(),
            auth.clone(),
            tokens.clone(),
        ));
        let journal: Arc<dyn JournalClient> = Arc::new(HttpJournalClient::new(
            http.clone(),
            config.journal.url.clone(),
            auth,
            tokens.clone(),
            config.repository.org_id.clone(),
            config.repository.api_key.clone(),
        ));
        let connectors: Arc<dyn ConnectorProvider> = Arc::new(ConnectorRegistry::new(
            http,
            repository,
            tokens,
            config.destinations.clone(),
        ));
        let positions = PositionStore::new(store, config.journal.history_batches);
        let consumer = JournalConsumer::new(
            journal,
            resolver.clone(),
            connectors.clone(),
            positions,
            consumer_key(&config.repository.org_id, &config.repository.api_key),
            config.journal.content_root.clone(),
            config.journal.max_batches,
            config.journal.parallelism,
        );

        Ok(Self {
            consumer,
            resolver,
            connectors,
            content_root: config.journal.content_root,
        })
    }

    /// Consume the journal until end-of-journal or the batch bound.
    pub async fn consume(&self) -> Result<ConsumeReport, ExportError> {
        self.consumer.run().await
    }

    /// Export a single asset now, honouring its export directive. Used by
    /// the single-event trigger path.
    pub async fn export_one(&self, asset_path: &str) -> Result<EventOutcome, ExportError> {
        consume::export_asset(
            self.resolver.as_ref(),
            self.connectors.as_ref(),
            &self.content_root,
            asset_path,
        )
        .await
    }
}
