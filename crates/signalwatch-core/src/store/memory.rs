//! In-process stores for tests and single-node deployments.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::{AccountStore, CatalogStore, StoreError, UniqueField};
use crate::{Account, AccountId, CacheEntry, ExternalChannelId, NewAccount, VerificationToken};

/// Catalog entries held in memory. Each entry sits behind an `Arc` so a
/// replace swaps the whole snapshot at once.
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `entry` under `key`.
    pub fn with_entry(key: impl Into<String>, entry: CacheEntry) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.write() {
            entries.insert(key.into(), Arc::new(entry));
        }
        store
    }
}

impl CatalogStore for MemoryCatalogStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Backend(String::from("catalog store lock poisoned")))?;
        Ok(entries.get(key).map(|entry| entry.as_ref().clone()))
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Backend(String::from("catalog store lock poisoned")))?;
        entries.insert(key.to_string(), Arc::new(entry.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AccountTable {
    last_id: i64,
    rows: BTreeMap<AccountId, Account>,
}

/// Accounts held in memory behind one mutex, so every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    table: Mutex<AccountTable>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.lock().map(|table| table.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored account, ordered by id.
    pub fn snapshot(&self) -> Vec<Account> {
        self.lock()
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, AccountTable>, StoreError> {
        self.table
            .lock()
            .map_err(|_| StoreError::Backend(String::from("account store lock poisoned")))
    }
}

impl AccountStore for MemoryAccountStore {
    fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        let table = self.lock()?;
        Ok(table.rows.values().any(|account| account.email == email))
    }

    fn phone_taken(&self, phone: &str) -> Result<bool, StoreError> {
        let table = self.lock()?;
        Ok(table.rows.values().any(|account| account.phone == phone))
    }

    fn token_pending(&self, token: &VerificationToken) -> Result<bool, StoreError> {
        let table = self.lock()?;
        Ok(table
            .rows
            .values()
            .any(|account| account.verification_token.as_ref() == Some(token)))
    }

    fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let mut table = self.lock()?;

        for existing in table.rows.values() {
            let field = if existing.email == account.email {
                Some(UniqueField::Email)
            } else if existing.phone == account.phone {
                Some(UniqueField::Phone)
            } else if existing.verification_token.as_ref() == Some(&account.verification_token) {
                Some(UniqueField::VerificationToken)
            } else {
                None
            };
            if let Some(field) = field {
                return Err(StoreError::Conflict { field });
            }
        }

        table.last_id += 1;
        let id = AccountId::new(table.last_id).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let stored = Account {
            id,
            name: account.name,
            email: account.email,
            phone: account.phone,
            password_hash: account.password_hash,
            verification_token: Some(account.verification_token),
            external_channel_id: None,
        };
        table.rows.insert(id, stored.clone());
        Ok(stored)
    }

    fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let table = self.lock()?;
        Ok(table.rows.get(&id).cloned())
    }

    fn confirm(
        &self,
        token: &VerificationToken,
        channel_id: &ExternalChannelId,
    ) -> Result<Option<AccountId>, StoreError> {
        let mut table = self.lock()?;
        let pending = table.rows.values_mut().find(|account| {
            account.verification_token.as_ref() == Some(token)
                && account.external_channel_id.is_none()
        });

        Ok(pending.map(|account| {
            account.external_channel_id = Some(channel_id.clone());
            account.verification_token = None;
            account.id
        }))
    }
}
