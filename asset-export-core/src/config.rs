//! Invocation configuration for the export pipeline. Threaded explicitly
//! through construction, never held as process-wide state.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, info};

use crate::connectors::DestinationsConfig;
use crate::error::ExportError;
use crate::token::RepositoryCredentials;

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub repository: RepositoryConfig,
    pub journal: JournalConfig,
    /// Directory backing the shared state store (tokens + cursors).
    pub state_dir: PathBuf,
    #[serde(default)]
    pub destinations: DestinationsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    /// Author host the asset and metadata reads go against.
    pub host: String,
    pub credentials: RepositoryCredentials,
    pub org_id: String,
    /// Subscription key; together with `org_id` it forms the consumer
    /// identity for checkpointing.
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    pub url: String,
    /// Maximum journal fetches per invocation; bounds invocation duration.
    #[serde(default = "default_max_batches")]
    pub max_batches: usize,
    /// Only assets under this root are considered for export.
    #[serde(default = "default_content_root")]
    pub content_root: String,
    /// Bounded fan-out width for per-event exports within a batch.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// How many consumed batches the position store retains as history.
    #[serde(default = "default_history_batches")]
    pub history_batches: usize,
}

fn default_max_batches() -> usize {
    10
}

fn default_content_root() -> String {
    "/content/dam".to_string()
}

fn default_parallelism() -> usize {
    8
}

fn default_history_batches() -> usize {
    20
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.repository.host.is_empty() {
            return Err(ExportError::Config("repository.host must be set".into()));
        }
        if self.journal.url.is_empty() {
            return Err(ExportError::Config("journal.url must be set".into()));
        }
        if self.journal.max_batches == 0 {
            return Err(ExportError::Config(
                "journal.max_batches must be at least 1".into(),
            ));
        }
        if self.journal.history_batches == 0 {
            return Err(ExportError::Config(
                "journal.history_batches must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            repository_host = %self.repository.host,
            journal_url = %self.journal.url,
            max_batches = self.journal.max_batches,
            content_root = %self.journal.content_root,
            state_dir = %self.state_dir.display(),
            object_storage = self.destinations.object_storage.is_some(),
            marketing = self.destinations.marketing.is_some(),
            "loaded export configuration"
        );
        debug!(?self, "export configuration (full debug)");
    }
}
