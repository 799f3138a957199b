use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use asset_export_core::contract::{Clock, IdentityProvider, StateStore, TokenResponse};
use asset_export_core::error::ExportError;
use asset_export_core::state::FsStateStore;
use asset_export_core::token::TokenCache;

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

/// Counts exchanges and hands out a distinct token per exchange.
struct CountingProvider {
    calls: AtomicUsize,
    expires_in: u64,
    delay_ms: u64,
}

impl CountingProvider {
    fn new(expires_in: u64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            expires_in,
            delay_ms: 0,
        })
    }

    fn slow(expires_in: u64, delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            expires_in,
            delay_ms,
        })
    }

    fn exchanges(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for CountingProvider {
    fn cache_key(&self) -> String {
        "repository-access-token-test-client".to_string()
    }

    async fn exchange(&self) -> Result<TokenResponse, ExportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        Ok(TokenResponse {
            access_token: format!("token-{n}"),
            expires_in: self.expires_in,
        })
    }
}

struct FailingProvider;

#[async_trait]
impl IdentityProvider for FailingProvider {
    fn cache_key(&self) -> String {
        "repository-access-token-broken-client".to_string()
    }

    async fn exchange(&self) -> Result<TokenResponse, ExportError> {
        Err(ExportError::Credential("provider rejected the exchange".to_string()))
    }
}

fn cache_with_clock(dir: &std::path::Path, clock: Arc<FakeClock>) -> TokenCache {
    let store: Arc<dyn StateStore> = Arc::new(FsStateStore::new(dir, clock).expect("state dir"));
    TokenCache::new(store)
}

#[tokio::test]
async fn second_call_within_ttl_reuses_cached_token() {
    let temp = tempfile::tempdir().unwrap();
    let cache = cache_with_clock(temp.path(), FakeClock::at(1_000));
    let provider = CountingProvider::new(3_600);

    let first = cache.get_token(provider.as_ref()).await.unwrap();
    let second = cache.get_token(provider.as_ref()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.exchanges(), 1, "second call must hit the cache");
}

#[tokio::test]
async fn expired_token_triggers_a_fresh_exchange() {
    let temp = tempfile::tempdir().unwrap();
    let clock = FakeClock::at(1_000);
    let cache = cache_with_clock(temp.path(), clock.clone());
    let provider = CountingProvider::new(3_600);

    let first = cache.get_token(provider.as_ref()).await.unwrap();
    clock.advance(3_600);
    let second = cache.get_token(provider.as_ref()).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(provider.exchanges(), 2);
}

/// The cached TTL is 95% of what the provider reported: with
/// `expires_in = 1000` the entry dies at +950 seconds, not +1000.
#[tokio::test]
async fn safety_margin_shortens_the_cached_ttl() {
    let temp = tempfile::tempdir().unwrap();
    let clock = FakeClock::at(0);
    let cache = cache_with_clock(temp.path(), clock.clone());
    let provider = CountingProvider::new(1_000);

    cache.get_token(provider.as_ref()).await.unwrap();

    clock.advance(949);
    cache.get_token(provider.as_ref()).await.unwrap();
    assert_eq!(provider.exchanges(), 1, "still inside the 95% window");

    clock.advance(1);
    cache.get_token(provider.as_ref()).await.unwrap();
    assert_eq!(provider.exchanges(), 2, "margin expired the entry early");
}

/// Two concurrent misses for the same key elect a single exchange.
#[tokio::test]
async fn concurrent_misses_are_single_flight() {
    let temp = tempfile::tempdir().unwrap();
    let cache = Arc::new(cache_with_clock(temp.path(), FakeClock::at(0)));
    let provider = CountingProvider::slow(3_600, 100);

    let (a, b) = tokio::join!(
        cache.get_token(provider.as_ref()),
        cache.get_token(provider.as_ref()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a, b);
    assert_eq!(provider.exchanges(), 1, "only one in-flight exchange per key");
}

#[tokio::test]
async fn exchange_failure_surfaces_as_credential_error() {
    let temp = tempfile::tempdir().unwrap();
    let cache = cache_with_clock(temp.path(), FakeClock::at(0));

    let err = cache.get_token(&FailingProvider).await.unwrap_err();
    assert!(matches!(err, ExportError::Credential(_)));
}

/// Separate provider namespaces never share tokens, even with the same
/// client id embedded in the key.
#[tokio::test]
async fn provider_namespaces_are_isolated() {
    struct NamespacedProvider(&'static str);

    #[async_trait]
    impl IdentityProvider for NamespacedProvider {
        fn cache_key(&self) -> String {
            format!("{}-access-token-shared-client", self.0)
        }
        async fn exchange(&self) -> Result<TokenResponse, ExportError> {
            Ok(TokenResponse {
                access_token: format!("{}-token", self.0),
                expires_in: 3_600,
            })
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let cache = cache_with_clock(temp.path(), FakeClock::at(0));

    let repo = cache.get_token(&NamespacedProvider("repository")).await.unwrap();
    let marketing = cache.get_token(&NamespacedProvider("marketing")).await.unwrap();
    assert_ne!(repo, marketing);
}
