//! Error taxonomy for the export pipeline.
//!
//! Errors fall into two classes with different propagation policy:
//! - *per-asset* errors (metadata fetch, unknown destination, connector
//!   transfer) are contained by the consumer loop: the asset is skipped or
//!   dead-lettered and sibling exports in the same batch continue.
//! - everything else (credentials, journal fetch, checkpoint persistence,
//!   configuration) is fatal to the invocation and propagates to the caller.
//!   The scheduler is expected to re-invoke, resuming from the last durably
//!   checkpointed cursor.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// Identity-provider exchange failed. Without a token nothing proceeds.
    #[error("credential exchange failed: {0}")]
    Credential(String),

    /// Metadata read for a single asset failed or returned a malformed body.
    #[error("metadata fetch failed for {asset_path}: {reason}")]
    MetadataFetch { asset_path: String, reason: String },

    /// A directive named a destination id no connector is registered for.
    #[error("unknown export destination '{0}'")]
    UnknownDestination(String),

    /// A connector failed to transfer one asset.
    #[error("export failed for {asset_path}: {reason}")]
    ConnectorExport { asset_path: String, reason: String },

    /// The journal endpoint could not be read. Aborts before checkpointing
    /// the in-flight batch.
    #[error("journal fetch failed: {0}")]
    JournalFetch(String),

    /// Persisting the consumer position failed. The in-memory cursor must
    /// not advance past this.
    #[error("checkpoint persist failed: {0}")]
    CheckpointPersist(String),

    /// Invalid or incomplete invocation configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ExportError {
    /// Whether the consumer loop may contain this error and continue with
    /// the rest of the batch.
    pub fn is_per_asset(&self) -> bool {
        matches!(
            self,
            ExportError::MetadataFetch { .. }
                | ExportError::UnknownDestination(_)
                | ExportError::ConnectorExport { .. }
        )
    }
}

/// Errors from the persisted key-value store. Callers map these into the
/// [`ExportError`] variant appropriate to their context (credential cache
/// vs. position checkpointing).
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_asset_classification() {
        assert!(ExportError::MetadataFetch {
            asset_path: "/content/dam/a.jpg".into(),
            reason: "503".into()
        }
        .is_per_asset());
        assert!(ExportError::UnknownDestination("nope".into()).is_per_asset());
        assert!(!ExportError::Credential("denied".into()).is_per_asset());
        assert!(!ExportError::JournalFetch("timeout".into()).is_per_asset());
        assert!(!ExportError::CheckpointPersist("disk full".into()).is_per_asset());
    }
}
