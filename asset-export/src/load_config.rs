/// `load_config` module: Loads and adapts a static YAML config—including
/// environment secret injection—into the core `ExportConfig`.
///
/// This module is the only place where untrusted YAML is parsed and mapped
/// to rich, strongly-typed internal structs.
///
/// # Responsibilities
/// - Parse user-supplied YAML configuration files into type-safe Rust structs
/// - Inject environment variables for secret fields (client ids/secrets,
///   subscription key, storage token) so secrets never live in the file
/// - Fail loudly when a configured destination is missing its secrets: a
///   referenced destination with unset credentials is a configuration error,
///   not something to ignore silently
/// - Acts as the adapter layer decoupling input schemas from the domain core
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich
/// diagnostics, and are surfaced at the CLI boundary.
///
use anyhow::Result;
use asset_export_core::config::{ExportConfig, JournalConfig, RepositoryConfig};
use asset_export_core::connectors::{DestinationsConfig, MarketingConfig, ObjectStorageConfig};
use asset_export_core::token::RepositoryCredentials;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct RawConfig {
    repository: RepositorySection,
    journal: JournalConfig,
    state_dir: PathBuf,
    #[serde(default)]
    destinations: DestinationsSection,
}

#[derive(Debug, Deserialize)]
struct RepositorySection {
    host: String,
    token_endpoint: String,
    org_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct DestinationsSection {
    object_storage: Option<ObjectStorageSection>,
    marketing: Option<MarketingSection>,
}

#[derive(Debug, Deserialize)]
struct ObjectStorageSection {
    endpoint: String,
    container: String,
}

#[derive(Debug, Deserialize)]
struct MarketingSection {
    rest_host: String,
    folder_id: i64,
}

fn require_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set in the environment"))
}

/// Loads a static YAML config file (no secrets) and injects required env
/// vars for secrets. Returns the fully assembled core config.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ExportConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let repository = RepositoryConfig {
        host: raw.repository.host,
        credentials: RepositoryCredentials {
            token_endpoint: raw.repository.token_endpoint,
            client_id: require_env("REPOSITORY_CLIENT_ID")?,
            client_secret: require_env("REPOSITORY_CLIENT_SECRET")?,
            technical_account_id: require_env("REPOSITORY_TECHNICAL_ACCOUNT_ID")?,
            org_id: raw.repository.org_id.clone(),
        },
        org_id: raw.repository.org_id,
        api_key: require_env("SUBSCRIPTION_API_KEY")?,
    };

    let object_storage = raw
        .destinations
        .object_storage
        .map(|section| {
            Ok::<_, anyhow::Error>(ObjectStorageConfig {
                endpoint: section.endpoint,
                container: section.container,
                sas_token: require_env("OBJECT_STORAGE_SAS_TOKEN")?,
            })
        })
        .transpose()?;
    let marketing = raw
        .destinations
        .marketing
        .map(|section| {
            Ok::<_, anyhow::Error>(MarketingConfig {
                rest_host: section.rest_host,
                folder_id: section.folder_id,
                client_id: require_env("MARKETING_CLIENT_ID")?,
                client_secret: require_env("MARKETING_CLIENT_SECRET")?,
            })
        })
        .transpose()?;

    Ok(ExportConfig {
        repository,
        journal: raw.journal,
        state_dir: raw.state_dir,
        destinations: DestinationsConfig {
            object_storage,
            marketing,
        },
    })
}
