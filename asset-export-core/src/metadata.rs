//! Metadata resolver: fetches the per-asset export directive from the
//! repository. Always fetched fresh, never cached, since it reflects the
//! author's current intent for the asset.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::contract::{DirectiveResolver, ExportDirective};
use crate::error::ExportError;
use crate::token::{RepositoryAuth, TokenCache};

pub struct HttpDirectiveResolver {
    http: reqwest::Client,
    repository_host: String,
    auth: Arc<RepositoryAuth>,
    tokens: Arc<TokenCache>,
}

impl HttpDirectiveResolver {
    pub fn new(
        http: reqwest::Client,
        repository_host: String,
        auth: Arc<RepositoryAuth>,
        tokens: Arc<TokenCache>,
    ) -> Self {
        Self {
            http,
            repository_host,
            auth,
            tokens,
        }
    }
}

#[async_trait]
impl DirectiveResolver for HttpDirectiveResolver {
    async fn resolve(&self, asset_path: &str) -> Result<ExportDirective, ExportError> {
        // Credential failures stay fatal; only the metadata read itself is
        // a per-asset error.
        let token = self.tokens.get_token(self.auth.as_ref()).await?;

        let url = format!("{}{}/metadata", self.repository_host, asset_path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ExportError::MetadataFetch {
                asset_path: asset_path.to_string(),
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, asset = asset_path, "metadata endpoint returned error");
            return Err(ExportError::MetadataFetch {
                asset_path: asset_path.to_string(),
                reason: format!("metadata endpoint returned {status}"),
            });
        }
        let body: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ExportError::MetadataFetch {
                    asset_path: asset_path.to_string(),
                    reason: format!("malformed metadata payload: {e}"),
                })?;
        let directive = parse_directive(&body);
        debug!(asset = asset_path, ?directive, "resolved export directive");
        Ok(directive)
    }
}

/// Extract the recognised directive fields from the flat metadata object.
/// Missing fields yield an absent directive; `exportImmediately` counts only
/// when it is exactly the string `"yes"`.
pub(crate) fn parse_directive(body: &serde_json::Value) -> ExportDirective {
    let destination_id = body
        .get("exportDestination")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    let export_immediately =
        body.get("exportImmediately").and_then(|v| v.as_str()) == Some("yes");
    ExportDirective {
        destination_id,
        export_immediately,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_directive_is_actionable() {
        let directive = parse_directive(&json!({
            "exportDestination": "object-storage",
            "exportImmediately": "yes",
            "dc:title": "a.jpg"
        }));
        assert_eq!(directive.destination_id.as_deref(), Some("object-storage"));
        assert!(directive.is_actionable());
    }

    #[test]
    fn missing_fields_yield_absent_directive() {
        assert_eq!(parse_directive(&json!({})), ExportDirective::absent());
        assert_eq!(
            parse_directive(&json!({"dc:title": "b.jpg"})),
            ExportDirective::absent()
        );
    }

    #[test]
    fn only_literal_yes_enables_immediate_export() {
        let directive = parse_directive(&json!({
            "exportDestination": "marketing",
            "exportImmediately": "no"
        }));
        assert!(!directive.export_immediately);
        assert!(!directive.is_actionable());

        let directive = parse_directive(&json!({
            "exportDestination": "marketing",
            "exportImmediately": true
        }));
        assert!(!directive.export_immediately, "non-string values do not count");
    }
}
