//! # Instrument Catalog Cache
//!
//! Serves the list of tradable perpetual instruments that downstream analysis
//! iterates over. The list comes from the exchange's metadata endpoint and is
//! persisted with a one-hour TTL.
//!
//! ## Read path
//!
//! 1. Fresh persisted entry: returned as-is, no network access.
//! 2. Stale or absent: one GET with a fixed timeout, then filter and persist.
//! 3. Fetch failed (transport, non-2xx, malformed payload): the previous
//!    entry's symbols are returned unchanged, or an empty list when nothing
//!    was ever persisted.
//!
//! [`CatalogCache::get_symbols`] never fails. A failed fetch never touches the
//! persisted entry, and there is no ceiling on how old a fallback entry may be.
//!
//! ## Concurrency
//!
//! Refreshes are serialized per cache. A caller that arrives during a refresh
//! waits for it and then reads what it produced instead of fetching again, so
//! no caller waits longer than one fetch.

mod source;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::{fallback_symbols, servable, CacheEntry, CacheMode};
use crate::clock::Clock;
use crate::http_client::{HttpClient, HttpError, HttpRequest};
use crate::store::CatalogStore;

pub use source::{parse_instruments, InstrumentFilter, RawInstrument};

/// Binance USDⓈ-M futures exchange metadata.
pub const DEFAULT_EXCHANGE_INFO_URL: &str = "https://fapi.binance.com/fapi/v1/exchangeInfo";

/// Storage key of the catalog snapshot.
pub const DEFAULT_CACHE_KEY: &str = "crypto_symbols";

/// Why a catalog fetch produced no new entry.
#[derive(Debug, Error)]
pub enum CatalogFetchError {
    /// Timeout, connection failure or unreadable body.
    #[error("catalog request failed: {0}")]
    Transport(#[from] HttpError),

    /// Upstream answered outside 2xx.
    #[error("catalog endpoint returned HTTP {status}")]
    Status { status: u16 },

    /// Body is not the expected metadata document.
    #[error("malformed catalog payload: {reason}")]
    Malformed { reason: String },
}

impl CatalogFetchError {
    /// `true` for network-level failures, `false` for bad payloads.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

/// Catalog cache settings.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub endpoint: String,
    pub cache_key: String,
    pub ttl: Duration,
    pub timeout: Duration,
    pub filter: InstrumentFilter,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_EXCHANGE_INFO_URL.to_string(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            ttl: Duration::from_secs(3_600),
            timeout: Duration::from_secs(10),
            filter: InstrumentFilter::default(),
        }
    }
}

impl CatalogConfig {
    /// Defaults with `SIGNALWATCH_CATALOG_URL` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("SIGNALWATCH_CATALOG_URL") {
            if !endpoint.trim().is_empty() {
                config.endpoint = endpoint.trim().to_string();
            }
        }
        config
    }
}

pub struct CatalogCache {
    config: CatalogConfig,
    http: Arc<dyn HttpClient>,
    store: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
    refresh_lock: tokio::sync::Mutex<()>,
    /// Bumped after every finished fetch attempt, successful or not.
    attempts: AtomicU64,
}

impl CatalogCache {
    pub fn new(
        config: CatalogConfig,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn CatalogStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            http,
            store,
            clock,
            refresh_lock: tokio::sync::Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Current catalog, refreshing it when the persisted entry has expired.
    pub async fn get_symbols(&self) -> Vec<String> {
        self.get_symbols_with(CacheMode::Use).await
    }

    pub async fn get_symbols_with(&self, mode: CacheMode) -> Vec<String> {
        let ttl = self.config.ttl;
        let cached = self.load_entry().await;
        if servable(cached.as_ref(), mode, self.clock.now(), ttl) {
            tracing::debug!(key = %self.config.cache_key, "catalog served from cache");
            return cached.map(|entry| entry.symbols).unwrap_or_default();
        }

        let seen_attempts = self.attempts.load(Ordering::Acquire);
        let _refresh = self.refresh_lock.lock().await;

        let cached = self.load_entry().await;
        if self.attempts.load(Ordering::Acquire) != seen_attempts {
            // A refresh finished while we waited; serve its outcome.
            return match cached {
                Some(entry) => entry.symbols,
                None => Vec::new(),
            };
        }
        if servable(cached.as_ref(), mode, self.clock.now(), ttl) {
            return cached.map(|entry| entry.symbols).unwrap_or_default();
        }

        tracing::info!(key = %self.config.cache_key, endpoint = %self.config.endpoint, "refreshing catalog");
        let outcome = self.fetch().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(entry) => {
                tracing::info!(
                    key = %self.config.cache_key,
                    symbols = entry.symbols.len(),
                    "catalog refreshed"
                );
                let symbols = entry.symbols.clone();
                self.save_entry(entry).await;
                symbols
            }
            Err(error) => {
                tracing::warn!(
                    key = %self.config.cache_key,
                    transient = error.is_transient(),
                    has_fallback = cached.is_some(),
                    %error,
                    "catalog refresh failed, serving previous entry"
                );
                fallback_symbols(cached.as_ref())
            }
        }
    }

    /// Fetch and filter the remote catalog without touching the store.
    pub async fn fetch(&self) -> Result<CacheEntry, CatalogFetchError> {
        let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
        let request = HttpRequest::get(self.config.endpoint.as_str())
            .with_header("accept", "application/json")
            .with_timeout_ms(timeout_ms);

        let response = self.http.execute(request).await?;
        if !response.is_success() {
            return Err(CatalogFetchError::Status {
                status: response.status,
            });
        }

        let instruments = parse_instruments(&response.body)?;
        let symbols = self.config.filter.apply(&instruments);
        Ok(CacheEntry::new(symbols, self.clock.now()))
    }

    // Store backends do file or database I/O, so they run on the blocking pool.
    async fn load_entry(&self) -> Option<CacheEntry> {
        let store = Arc::clone(&self.store);
        let key = self.config.cache_key.clone();
        match tokio::task::spawn_blocking(move || store.load(&key)).await {
            Ok(Ok(entry)) => entry,
            Ok(Err(error)) => {
                tracing::warn!(key = %self.config.cache_key, %error, "failed to read persisted catalog");
                None
            }
            Err(error) => {
                tracing::warn!(key = %self.config.cache_key, %error, "catalog read task failed");
                None
            }
        }
    }

    async fn save_entry(&self, entry: CacheEntry) {
        let store = Arc::clone(&self.store);
        let key = self.config.cache_key.clone();
        match tokio::task::spawn_blocking(move || store.save(&key, &entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(key = %self.config.cache_key, %error, "failed to persist catalog");
            }
            Err(error) => {
                tracing::warn!(key = %self.config.cache_key, %error, "catalog write task failed");
            }
        }
    }
}
