//! # Signalwatch Core
//!
//! Core contracts and domain types for the Signalwatch trading-signals
//! service.
//!
//! ## Overview
//!
//! - **Instrument catalog cache**: the list of tradable perpetual contracts,
//!   fetched from the exchange, filtered and persisted with a one-hour TTL.
//!   A failed refresh serves the previous list, or an empty one.
//! - **Messaging-channel verification**: registration of pending accounts,
//!   bot deep links, confirmation callbacks and polling for a session grant.
//! - **Store traits** with in-memory, JSON-file and DuckDB backends.
//! - **HTTP client abstraction** for the upstream catalog endpoint.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Cache entry and freshness rules |
//! | [`catalog`] | Catalog fetch, filter and cached read path |
//! | [`clock`] | Injectable time source |
//! | [`domain`] | Accounts, tokens, identifiers, timestamps |
//! | [`error`] | Validation errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`store`] | Persistence contracts and backends |
//! | [`verification`] | Registration, confirmation and polling |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use signalwatch_core::{
//!     CatalogCache, CatalogConfig, ReqwestHttpClient, SystemClock, Warehouse,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Arc::new(Warehouse::open_default()?);
//!     let cache = CatalogCache::new(
//!         CatalogConfig::from_env(),
//!         Arc::new(ReqwestHttpClient::new()),
//!         warehouse,
//!         Arc::new(SystemClock),
//!     );
//!
//!     for symbol in cache.get_symbols().await {
//!         println!("{symbol}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod store;
pub mod verification;

// Caching
pub use cache::{CacheEntry, CacheMode};

// Catalog
pub use catalog::{
    CatalogCache, CatalogConfig, CatalogFetchError, InstrumentFilter, RawInstrument,
    DEFAULT_CACHE_KEY, DEFAULT_EXCHANGE_INFO_URL,
};

// Time
pub use clock::{Clock, ManualClock, SystemClock};

// Domain models
pub use domain::{
    Account, AccountId, Candidate, ExternalChannelId, NewAccount, UtcDateTime, VerificationToken,
};

// Error types
pub use error::{Field, ValidationError, ValidationErrors};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
    ScriptedHttpClient,
};

// Stores
pub use store::{
    AccountStore, CatalogStore, JsonFileCatalogStore, MemoryAccountStore, MemoryCatalogStore,
    StoreError, UniqueField,
};

// Verification
pub use verification::{
    ConfirmOutcome, ConfirmationCallback, ConfirmationLink, PollOutcome, Registration,
    SessionGrant, TokenGenerator, VerificationConfig, VerificationError, VerificationFlow,
};

// Warehouse (re-exported from signalwatch-warehouse)
pub use signalwatch_warehouse::{Warehouse, WarehouseConfig, WarehouseError};
