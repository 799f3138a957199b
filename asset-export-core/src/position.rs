//! Position store: durable cursor checkpoints plus a bounded trailing
//! history of consumed batches, keyed by consumer identity.
//!
//! `append_batch` writes the whole consumer state document in one atomic
//! store write: either the advanced cursor and the appended history land
//! together, or neither does. The store never deduplicates; appending the
//! same batch twice after a crash-and-retry grows the history with a
//! duplicate entry, which the at-least-once model accepts. Retained history
//! is capped to the most recent `history_batches` entries.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contract::{Cursor, Event, StateStore};
use crate::error::ExportError;

/// Consumer identity for checkpoint state: organization + subscription key.
pub fn consumer_key(org_id: &str, api_key: &str) -> String {
    format!("journal-cursor-{org_id}-{api_key}")
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConsumerState {
    pub latest_position: Option<Cursor>,
    #[serde(default)]
    pub recent_batches: Vec<Vec<Event>>,
}

#[derive(Clone)]
pub struct PositionStore {
    store: Arc<dyn StateStore>,
    history_batches: usize,
}

impl PositionStore {
    pub fn new(store: Arc<dyn StateStore>, history_batches: usize) -> Self {
        Self {
            store,
            history_batches,
        }
    }

    pub async fn latest_position(&self, key: &str) -> Result<Option<Cursor>, ExportError> {
        Ok(self.load(key).await?.latest_position)
    }

    /// Checkpoint a consumed batch: advance the cursor to the batch's last
    /// event and append the batch to the trailing history. Empty batches are
    /// a no-op so the cursor can never regress.
    pub async fn append_batch(&self, key: &str, events: &[Event]) -> Result<(), ExportError> {
        let Some(last) = events.last() else {
            return Ok(());
        };
        let mut state = self.load(key).await?;
        state.latest_position = Some(last.position.clone());
        state.recent_batches.push(events.to_vec());
        if state.recent_batches.len() > self.history_batches {
            let excess = state.recent_batches.len() - self.history_batches;
            state.recent_batches.drain(..excess);
            debug!(key, dropped = excess, "trimmed checkpoint history");
        }
        let value = serde_json::to_value(&state)
            .map_err(|e| ExportError::CheckpointPersist(e.to_string()))?;
        self.store
            .put(key, value, None)
            .await
            .map_err(|e| ExportError::CheckpointPersist(e.to_string()))?;
        info!(key, position = %last.position, events = events.len(), "checkpointed batch");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<ConsumerState, ExportError> {
        let value = self
            .store
            .get(key)
            .await
            .map_err(|e| ExportError::CheckpointPersist(format!("failed to read consumer state: {e}")))?;
        match value {
            None => Ok(ConsumerState::default()),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                ExportError::CheckpointPersist(format!("corrupt consumer state for {key}: {e}"))
            }),
        }
    }
}
