//! Persistence contracts for the catalog cache and the verification flow.
//!
//! | Backend | Catalog | Accounts |
//! |---------|---------|----------|
//! | [`memory`] | [`MemoryCatalogStore`] | [`MemoryAccountStore`] |
//! | [`file`] | [`JsonFileCatalogStore`] | - |
//! | [`warehouse`] | `Warehouse` | `Warehouse` |

pub mod file;
pub mod memory;
pub mod warehouse;

use thiserror::Error;

use crate::{Account, AccountId, CacheEntry, ExternalChannelId, NewAccount, VerificationToken};

pub use file::JsonFileCatalogStore;
pub use memory::{MemoryAccountStore, MemoryCatalogStore};
pub use signalwatch_warehouse::UniqueField;

/// Storage failure reported by a store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column already holds the value.
    #[error("{field} is already in use")]
    Conflict { field: UniqueField },

    /// Stored data could not be mapped back to domain values.
    #[error("stored record is invalid: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable home of catalog snapshots, addressed by a fixed key.
///
/// `save` must replace the whole entry atomically: a concurrent `load` sees
/// either the previous entry or the new one. Calls may block; `CatalogCache`
/// makes them from the blocking thread pool.
pub trait CatalogStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StoreError>;
    fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError>;
}

/// Account persistence used by the verification flow.
pub trait AccountStore: Send + Sync {
    fn email_taken(&self, email: &str) -> Result<bool, StoreError>;
    fn phone_taken(&self, phone: &str) -> Result<bool, StoreError>;

    /// Whether a pending account currently holds `token`.
    fn token_pending(&self, token: &VerificationToken) -> Result<bool, StoreError>;

    /// Insert a pending account. Fails with [`StoreError::Conflict`] when the
    /// email, phone or token is taken; the check and insert are one step.
    fn create(&self, account: NewAccount) -> Result<Account, StoreError>;

    fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Conditional update: where the pending token equals `token`, set the
    /// channel id and clear the token. Returns the confirmed id, or `None`
    /// when nothing matched.
    fn confirm(
        &self,
        token: &VerificationToken,
        channel_id: &ExternalChannelId,
    ) -> Result<Option<AccountId>, StoreError>;
}
