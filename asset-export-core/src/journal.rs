//! Event journal client: authenticated reads against the repository's
//! append-only change journal.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::contract::{Cursor, Event, JournalClient};
use crate::error::ExportError;
use crate::token::{RepositoryAuth, TokenCache};

pub struct HttpJournalClient {
    http: reqwest::Client,
    journal_url: String,
    auth: Arc<RepositoryAuth>,
    tokens: Arc<TokenCache>,
    org_id: String,
    api_key: String,
}

impl HttpJournalClient {
    pub fn new(
        http: reqwest::Client,
        journal_url: String,
        auth: Arc<RepositoryAuth>,
        tokens: Arc<TokenCache>,
        org_id: String,
        api_key: String,
    ) -> Self {
        Self {
            http,
            journal_url,
            auth,
            tokens,
            org_id,
            api_key,
        }
    }
}

#[async_trait]
impl JournalClient for HttpJournalClient {
    async fn fetch_batch(&self, since: Option<Cursor>) -> Result<Option<Vec<Event>>, ExportError> {
        let token = self.tokens.get_token(self.auth.as_ref()).await?;

        let mut request = self
            .http
            .get(&self.journal_url)
            .bearer_auth(&token)
            .header("x-org-id", &self.org_id)
            .header("x-api-key", &self.api_key);
        if let Some(since) = &since {
            request = request.query(&[("since", since.as_query_param())]);
        }
        debug!(url = %self.journal_url, since = ?since, "fetching journal batch");

        let response = request
            .send()
            .await
            .map_err(|e| ExportError::JournalFetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExportError::JournalFetch(format!(
                "journal endpoint returned {status}"
            )));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExportError::JournalFetch(format!("malformed journal response: {e}")))?;
        let batch = parse_journal_response(body)?;
        match &batch {
            Some(events) => debug!(events = events.len(), "journal batch fetched"),
            None => info!("no new events found in journal"),
        }
        Ok(batch)
    }
}

/// A response carrying an `events` array is a batch, already in ascending
/// position order (never re-sorted here); a response without one is the
/// end-of-journal sentinel.
pub(crate) fn parse_journal_response(
    body: serde_json::Value,
) -> Result<Option<Vec<Event>>, ExportError> {
    match body.get("events") {
        None => Ok(None),
        Some(events) => serde_json::from_value(events.clone())
            .map(Some)
            .map_err(|e| ExportError::JournalFetch(format!("malformed events array: {e}"))),
    }
}
