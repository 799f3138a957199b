//! Consumer loop: orchestrates repeated fetch → filter → export → checkpoint
//! cycles over the change journal within one invocation.
//!
//! # Control flow
//! - Load the last checkpointed cursor (absent means read the journal from
//!   the beginning of its retained window).
//! - Fetch a batch; the end-of-journal sentinel terminates the loop, as does
//!   the configured maximum number of batches per invocation (which bounds
//!   invocation duration, not completion).
//! - Export qualifying events with bounded concurrency; one asset's failure
//!   never aborts its siblings. Per-asset failures become dead-letter
//!   records in the report rather than errors.
//! - Checkpoint the full batch at its last event's position regardless of
//!   individual export failures (at-least-once delivery; the dead-letter
//!   report is the explicit record of what was dropped). The next batch is
//!   never fetched before the checkpoint completes, so the cursor is
//!   monotone.
//!
//! Fatal faults (credentials, journal fetch, checkpoint persist) abort the
//! invocation before the in-flight batch is checkpointed; previously
//! checkpointed batches stay committed and the next invocation resumes from
//! them.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::contract::{ConnectorProvider, DirectiveResolver, Event, ExportOutcome, JournalClient};
use crate::error::ExportError;
use crate::position::PositionStore;

/// Record of a per-asset export failure that was dropped after its batch
/// was checkpointed. Surfaced in the invocation report so the drop is an
/// explicit, observable decision instead of a log line.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub asset_path: String,
    pub destination_id: Option<String>,
    pub reason: String,
}

/// What happened to one event.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventOutcome {
    Exported(ExportOutcome),
    Skipped { asset_path: String, reason: String },
    Failed(DeadLetter),
}

/// Structured result of one consume invocation.
#[derive(Debug, Default, Serialize)]
pub struct ConsumeReport {
    pub batches_fetched: usize,
    /// Total events in all checkpointed batches, qualifying or not.
    pub events_processed: usize,
    pub exported: usize,
    pub skipped: usize,
    pub dead_letters: Vec<DeadLetter>,
}

pub struct JournalConsumer {
    journal: Arc<dyn JournalClient>,
    resolver: Arc<dyn DirectiveResolver>,
    connectors: Arc<dyn ConnectorProvider>,
    positions: PositionStore,
    consumer_key: String,
    content_root: String,
    max_batches: usize,
    parallelism: usize,
}

impl JournalConsumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        journal: Arc<dyn JournalClient>,
        resolver: Arc<dyn DirectiveResolver>,
        connectors: Arc<dyn ConnectorProvider>,
        positions: PositionStore,
        consumer_key: String,
        content_root: String,
        max_batches: usize,
        parallelism: usize,
    ) -> Self {
        Self {
            journal,
            resolver,
            connectors,
            positions,
            consumer_key,
            content_root,
            max_batches,
            parallelism: parallelism.max(1),
        }
    }

    pub async fn run(&self) -> Result<ConsumeReport, ExportError> {
        let mut report = ConsumeReport::default();
        let mut cursor = self.positions.latest_position(&self.consumer_key).await?;
        match &cursor {
            None => info!("fetching events from the beginning of the journal"),
            Some(position) => info!(%position, "resuming journal from checkpointed position"),
        }

        while report.batches_fetched < self.max_batches {
            let Some(batch) = self.journal.fetch_batch(cursor.clone()).await? else {
                break;
            };
            report.batches_fetched += 1;
            let Some(last) = batch.last() else {
                warn!("journal returned an empty batch, treating as end of journal");
                break;
            };
            let last_position = last.position.clone();
            info!(
                batch = report.batches_fetched,
                events = batch.len(),
                latest = %last_position,
                "fetched journal batch"
            );

            let outcomes = self.export_batch(&batch).await?;
            for outcome in outcomes {
                match outcome {
                    EventOutcome::Exported(_) => report.exported += 1,
                    EventOutcome::Skipped { .. } => report.skipped += 1,
                    EventOutcome::Failed(dead_letter) => report.dead_letters.push(dead_letter),
                }
            }

            self.positions
                .append_batch(&self.consumer_key, &batch)
                .await?;
            report.events_processed += batch.len();
            cursor = Some(last_position);
        }

        info!(
            batches = report.batches_fetched,
            events = report.events_processed,
            exported = report.exported,
            dead_letters = report.dead_letters.len(),
            "journal consumption finished"
        );
        Ok(report)
    }

    /// Fan out per-event exports with bounded parallelism and fan back in
    /// before checkpointing. Only invocation-fatal errors escape here.
    async fn export_batch(&self, batch: &[Event]) -> Result<Vec<EventOutcome>, ExportError> {
        stream::iter(batch.iter().cloned())
            .map(|event| {
                export_event(
                    self.resolver.as_ref(),
                    self.connectors.as_ref(),
                    &self.content_root,
                    event,
                )
            })
            .buffer_unordered(self.parallelism)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }
}

/// Decide and execute the export of a single event: content-root filter,
/// directive resolution, connector dispatch. Per-asset errors are contained
/// as [`EventOutcome::Failed`]; fatal errors propagate.
pub async fn export_event(
    resolver: &dyn DirectiveResolver,
    connectors: &dyn ConnectorProvider,
    content_root: &str,
    event: Event,
) -> Result<EventOutcome, ExportError> {
    export_asset(resolver, connectors, content_root, &event.asset_path).await
}

/// Same decision path for a single asset outside the journal loop (the
/// single-event trigger entry point).
pub async fn export_asset(
    resolver: &dyn DirectiveResolver,
    connectors: &dyn ConnectorProvider,
    content_root: &str,
    asset_path: &str,
) -> Result<EventOutcome, ExportError> {
    if !asset_path.starts_with(content_root) {
        debug!(asset = asset_path, "asset outside monitored content root");
        return Ok(EventOutcome::Skipped {
            asset_path: asset_path.to_string(),
            reason: "outside monitored content root".to_string(),
        });
    }

    let directive = match resolver.resolve(asset_path).await {
        Ok(directive) => directive,
        Err(e) if e.is_per_asset() => {
            warn!(asset = asset_path, error = %e, "directive resolution failed, dead-lettering asset");
            return Ok(EventOutcome::Failed(DeadLetter {
                asset_path: asset_path.to_string(),
                destination_id: None,
                reason: e.to_string(),
            }));
        }
        Err(e) => return Err(e),
    };

    let destination_id = match (directive.destination_id, directive.export_immediately) {
        (Some(destination_id), true) => destination_id,
        _ => {
            debug!(asset = asset_path, "no immediate export directive");
            return Ok(EventOutcome::Skipped {
                asset_path: asset_path.to_string(),
                reason: "no immediate export directive".to_string(),
            });
        }
    };

    info!(asset = asset_path, destination = %destination_id, "exporting asset");
    let connector = match connectors.create(&destination_id).await {
        Ok(connector) => connector,
        Err(e) if e.is_per_asset() => {
            warn!(asset = asset_path, destination = %destination_id, error = %e, "no connector for destination, dead-lettering asset");
            return Ok(EventOutcome::Failed(DeadLetter {
                asset_path: asset_path.to_string(),
                destination_id: Some(destination_id),
                reason: e.to_string(),
            }));
        }
        Err(e) => return Err(e),
    };

    match connector.export(asset_path).await {
        Ok(outcome) => {
            info!(asset = asset_path, destination = %destination_id, "asset exported");
            Ok(EventOutcome::Exported(outcome))
        }
        Err(e) if e.is_per_asset() => {
            error!(asset = asset_path, destination = %destination_id, error = %e, "export failed, dead-lettering asset");
            Ok(EventOutcome::Failed(DeadLetter {
                asset_path: asset_path.to_string(),
                destination_id: Some(destination_id),
                reason: e.to_string(),
            }))
        }
        Err(e) => Err(e),
    }
}
