//! # contract: data model and trait seams for the export pipeline
//!
//! This module defines the wire-level data model (events, cursors, export
//! directives) and the traits the pipeline is orchestrated against.
//!
//! ## Interface & Extensibility
//! - Implement [`Connector`] plus a [`ConnectorProvider`] arm to route assets
//!   to a new destination kind.
//! - Implement [`JournalClient`] / [`DirectiveResolver`] to consume a
//!   different repository, keeping the consumer loop unchanged.
//! - All methods are async, returning [`ExportError`] so the loop can decide
//!   between per-asset containment and invocation abort.
//!
//! ## Mocking & Testing
//! - Traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests.

use std::time::SystemTime;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, StateError};

/// Opaque journal position marker. Assigned and ordered by the journal; the
/// pipeline never inspects its structure, only echoes it back as `since`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(serde_json::Value);

impl Cursor {
    /// Render the cursor for use as a query parameter value.
    pub fn as_query_param(&self) -> String {
        match &self.0 {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Value> for Cursor {
    fn from(value: serde_json::Value) -> Self {
        Cursor(value)
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_query_param())
    }
}

/// A single change event from the repository's append-only journal.
/// Immutable once fetched; batches arrive in ascending position order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub position: Cursor,
    #[serde(rename = "assetPath")]
    pub asset_path: String,
    #[serde(default)]
    pub kind: String,
}

/// Per-asset export instruction, resolved fresh at export-decision time
/// (never cached, since it reflects current author intent).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportDirective {
    pub destination_id: Option<String>,
    pub export_immediately: bool,
}

impl ExportDirective {
    /// An absent directive: no destination, no immediate export.
    pub fn absent() -> Self {
        Self::default()
    }

    /// True when the asset should be exported right now to a named
    /// destination.
    pub fn is_actionable(&self) -> bool {
        self.export_immediately && self.destination_id.is_some()
    }
}

/// Destination-specific result of a single transfer, used for reporting
/// only, never for control flow.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub destination_id: String,
    /// Bytes written to the destination, when the transport reports it.
    pub bytes_written: Option<u64>,
    /// Remote identifier or location of the exported asset.
    pub remote_id: Option<String>,
}

/// Successful response from an identity provider's token exchange.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    /// Remaining validity in seconds, as reported by the provider.
    pub expires_in: u64,
}

/// Fetches ordered event batches from the journal.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait JournalClient: Send + Sync {
    /// Fetch the next batch after `since`, or from the beginning of the
    /// retained window when `since` is absent. `None` is the end-of-journal
    /// sentinel, not an error.
    async fn fetch_batch(&self, since: Option<Cursor>) -> Result<Option<Vec<Event>>, ExportError>;
}

/// Resolves the per-asset export directive from the repository.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DirectiveResolver: Send + Sync {
    async fn resolve(&self, asset_path: &str) -> Result<ExportDirective, ExportError>;
}

/// Transfers one asset from the repository to one destination kind.
/// Implementations must stream the asset body rather than buffering it
/// whenever the transport allows.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn export(&self, asset_path: &str) -> Result<ExportOutcome, ExportError>;
}

/// Resolves a destination id to an initialised [`Connector`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ConnectorProvider: Send + Sync {
    /// Create and initialise a connector for the destination id. Unknown ids
    /// yield [`ExportError::UnknownDestination`], which callers treat as
    /// skip-this-asset; a known id with unset credentials is a configuration
    /// error.
    async fn create(&self, destination_id: &str) -> Result<Box<dyn Connector>, ExportError>;
}

/// Exchanges long-lived credentials for a short-lived bearer token.
/// Two independent providers exist in this system (repository access,
/// destination platform access); each supplies its own cache key namespace.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Stable cache key for tokens from this provider.
    fn cache_key(&self) -> String;

    /// Perform the provider's credential exchange. No retry here; retry
    /// policy belongs to the caller.
    async fn exchange(&self) -> Result<TokenResponse, ExportError>;
}

/// Shared persisted key-value store with optional TTL. Backs both the token
/// cache (TTL writes) and the position store (no-expiry writes).
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value; expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StateError>;

    /// Write a value, optionally expiring after `ttl_secs`. The write must
    /// be atomic: readers see either the previous or the new document.
    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl_secs: Option<u64>,
    ) -> Result<(), StateError>;
}

/// Time source, injected so TTL behaviour is testable without sleeping.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock implementation used everywhere outside tests.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}
