//! File-backed implementation of the shared [`StateStore`].
//!
//! One JSON document per key under a state directory. Each document wraps
//! the caller's value with an optional absolute expiry; expired entries read
//! as absent. Writes go through a temp file in the same directory followed
//! by an atomic rename, which is what makes checkpoint appends all-or-nothing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::{Clock, StateStore};
use crate::error::StateError;

pub struct FsStateStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    value: serde_json::Value,
    /// Unix seconds; absent means the entry never expires.
    expires_at: Option<u64>,
}

impl FsStateStore {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, clock })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn now_unix(&self) -> u64 {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StateError> {
        let path = self.path_for(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: Entry = serde_json::from_str(&raw)?;
        if let Some(expires_at) = entry.expires_at {
            if self.now_unix() >= expires_at {
                debug!(key, expires_at, "state entry expired");
                return Ok(None);
            }
        }
        Ok(Some(entry.value))
    }

    async fn put(
        &self,
        key: &str,
        value: serde_json::Value,
        ttl_secs: Option<u64>,
    ) -> Result<(), StateError> {
        let entry = Entry {
            value,
            expires_at: ttl_secs.map(|ttl| self.now_unix() + ttl),
        };
        let path = self.path_for(key);
        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&tmp, &entry)?;
        tmp.persist(&path).map_err(|e| e.error)?;
        debug!(key, path = %path.display(), ttl_secs, "persisted state entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::SystemTime;
    use tempfile::tempdir;

    struct FakeClock(AtomicU64);

    impl FakeClock {
        fn at(secs: u64) -> Arc<Self> {
            Arc::new(FakeClock(AtomicU64::new(secs)))
        }
        fn advance(&self, secs: u64) {
            self.0.fetch_add(secs, Ordering::SeqCst);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> SystemTime {
            UNIX_EPOCH + Duration::from_secs(self.0.load(Ordering::SeqCst))
        }
    }

    #[tokio::test]
    async fn missing_key_reads_as_absent() {
        let dir = tempdir().unwrap();
        let store = FsStateStore::new(dir.path(), FakeClock::at(1_000)).unwrap();
        assert!(store.get("nothing-here").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn roundtrips_a_value_without_ttl() {
        let dir = tempdir().unwrap();
        let store = FsStateStore::new(dir.path(), FakeClock::at(1_000)).unwrap();
        store
            .put("journal-cursor-org-key", json!({"latest": 12}), None)
            .await
            .unwrap();
        let read = store.get("journal-cursor-org-key").await.unwrap();
        assert_eq!(read, Some(json!({"latest": 12})));
    }

    #[tokio::test]
    async fn ttl_entry_expires() {
        let dir = tempdir().unwrap();
        let clock = FakeClock::at(1_000);
        let store = FsStateStore::new(dir.path(), clock.clone()).unwrap();
        store
            .put("token", json!("secret"), Some(100))
            .await
            .unwrap();
        assert_eq!(store.get("token").await.unwrap(), Some(json!("secret")));
        clock.advance(99);
        assert!(store.get("token").await.unwrap().is_some());
        clock.advance(1);
        assert!(store.get("token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_with_path_characters_are_sanitized() {
        let dir = tempdir().unwrap();
        let store = FsStateStore::new(dir.path(), FakeClock::at(0)).unwrap();
        store
            .put("journal-cursor-org/123:key", json!(1), None)
            .await
            .unwrap();
        assert_eq!(
            store.get("journal-cursor-org/123:key").await.unwrap(),
            Some(json!(1))
        );
    }

    #[tokio::test]
    async fn reopened_store_sees_previous_writes() {
        let dir = tempdir().unwrap();
        {
            let store = FsStateStore::new(dir.path(), FakeClock::at(0)).unwrap();
            store.put("cursor", json!(7), None).await.unwrap();
        }
        let store = FsStateStore::new(dir.path(), FakeClock::at(0)).unwrap();
        assert_eq!(store.get("cursor").await.unwrap(), Some(json!(7)));
    }
}
