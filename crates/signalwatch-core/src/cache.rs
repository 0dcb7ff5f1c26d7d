//! Cache entry value and freshness rules for the persisted catalog.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// How a catalog read treats the persisted entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Serve a non-expired entry; otherwise refresh from the network. (Default)
    #[default]
    Use,
    /// Refresh from the network even when the entry is still fresh. Failure
    /// still falls back to the persisted entry.
    Refresh,
}

/// A complete catalog snapshot. Always replaced whole, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub symbols: Vec<String>,
    pub fetched_at: UtcDateTime,
}

impl CacheEntry {
    pub fn new(symbols: Vec<String>, fetched_at: UtcDateTime) -> Self {
        Self {
            symbols,
            fetched_at,
        }
    }

    /// Fresh while strictly less than `ttl` has elapsed since the fetch.
    ///
    /// An entry stamped in the future counts as fresh.
    pub fn is_fresh(&self, now: UtcDateTime, ttl: Duration) -> bool {
        now.saturating_since(self.fetched_at) < ttl
    }
}

/// Decide whether `entry` can be served without touching the network.
pub fn servable(entry: Option<&CacheEntry>, mode: CacheMode, now: UtcDateTime, ttl: Duration) -> bool {
    match (mode, entry) {
        (CacheMode::Use, Some(entry)) => entry.is_fresh(now, ttl),
        _ => false,
    }
}

/// Symbols to hand back after a failed refresh: the previous entry's list, or
/// nothing at all.
pub fn fallback_symbols(previous: Option<&CacheEntry>) -> Vec<String> {
    previous
        .map(|entry| entry.symbols.clone())
        .unwrap_or_default()
}
