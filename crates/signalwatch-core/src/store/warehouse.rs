//! `CatalogStore` and `AccountStore` over the DuckDB warehouse.

use signalwatch_warehouse::{
    AccountRecord, CatalogEntryRecord, NewAccountRecord, Warehouse, WarehouseError,
};

use super::{AccountStore, CatalogStore, StoreError};
use crate::{
    Account, AccountId, CacheEntry, ExternalChannelId, NewAccount, UtcDateTime, VerificationToken,
};

impl From<WarehouseError> for StoreError {
    fn from(error: WarehouseError) -> Self {
        match error {
            WarehouseError::Conflict { field } => Self::Conflict { field },
            WarehouseError::Io(error) => Self::Io(error),
            WarehouseError::Serialization(error) => Self::Serialization(error),
            other => Self::Backend(other.to_string()),
        }
    }
}

impl CatalogStore for Warehouse {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let Some(record) = self.load_catalog_entry(key)? else {
            return Ok(None);
        };
        let fetched_at = UtcDateTime::from_unix_seconds(record.fetched_at_unix)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(CacheEntry::new(record.symbols, fetched_at)))
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        self.store_catalog_entry(&CatalogEntryRecord {
            cache_key: key.to_string(),
            symbols: entry.symbols.clone(),
            fetched_at_unix: entry.fetched_at.unix_seconds(),
        })?;
        Ok(())
    }
}

impl AccountStore for Warehouse {
    fn email_taken(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.email_exists(email)?)
    }

    fn phone_taken(&self, phone: &str) -> Result<bool, StoreError> {
        Ok(self.phone_exists(phone)?)
    }

    fn token_pending(&self, token: &VerificationToken) -> Result<bool, StoreError> {
        Ok(self.pending_token_exists(token.as_str())?)
    }

    fn create(&self, account: NewAccount) -> Result<Account, StoreError> {
        let record = self.insert_account(&NewAccountRecord {
            name: account.name,
            email: account.email,
            phone: account.phone,
            password_hash: account.password_hash,
            verification_token: account.verification_token.into(),
        })?;
        account_from_record(record)
    }

    fn find(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.find_account(id.get())?
            .map(account_from_record)
            .transpose()
    }

    fn confirm(
        &self,
        token: &VerificationToken,
        channel_id: &ExternalChannelId,
    ) -> Result<Option<AccountId>, StoreError> {
        self.confirm_account(token.as_str(), channel_id.as_str())?
            .map(|id| AccountId::new(id).map_err(|e| StoreError::Corrupt(e.to_string())))
            .transpose()
    }
}

fn account_from_record(record: AccountRecord) -> Result<Account, StoreError> {
    let corrupt = |e: crate::ValidationError| StoreError::Corrupt(e.to_string());
    Ok(Account {
        id: AccountId::new(record.id).map_err(corrupt)?,
        name: record.name,
        email: record.email,
        phone: record.phone,
        password_hash: record.password_hash,
        verification_token: record
            .verification_token
            .as_deref()
            .map(VerificationToken::parse)
            .transpose()
            .map_err(corrupt)?,
        external_channel_id: record.external_channel_id.map(ExternalChannelId::new),
    })
}
