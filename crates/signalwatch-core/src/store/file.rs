//! Catalog snapshots as JSON files, one file per cache key.
//!
//! File layout is `{"timestamp": <unix seconds>, "symbols": [...]}`. Each write
//! goes to its own uniquely named temp file in the same directory, which is
//! then renamed over the target, so a reader never opens a half-written
//! snapshot even when several writers overlap.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{CatalogStore, StoreError};
use crate::{CacheEntry, UtcDateTime};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    timestamp: i64,
    symbols: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JsonFileCatalogStore {
    dir: PathBuf,
}

impl JsonFileCatalogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        self.dir.as_path()
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(StoreError::Backend(format!("invalid cache key '{key}'")));
        }
        Ok(self.dir.join(format!("{key}_cache.json")))
    }
}

impl CatalogStore for JsonFileCatalogStore {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let path = self.path_for(key)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        // A damaged snapshot is the same as no snapshot: the next successful
        // fetch overwrites it.
        let snapshot: SnapshotFile = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring unreadable catalog snapshot");
                return Ok(None);
            }
        };
        let fetched_at = match UtcDateTime::from_unix_seconds(snapshot.timestamp) {
            Ok(fetched_at) => fetched_at,
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring catalog snapshot with bad timestamp");
                return Ok(None);
            }
        };

        Ok(Some(CacheEntry::new(snapshot.symbols, fetched_at)))
    }

    fn save(&self, key: &str, entry: &CacheEntry) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let body = serde_json::to_vec(&SnapshotFile {
            timestamp: entry.fetched_at.unix_seconds(),
            symbols: entry.symbols.clone(),
        })?;

        // Dropping an unpersisted temp file removes it.
        let mut staging = NamedTempFile::new_in(&self.dir)?;
        staging.write_all(&body)?;
        staging.as_file().sync_all()?;
        staging
            .persist(&path)
            .map_err(|error| StoreError::Io(error.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_snapshot_in_legacy_layout() {
        let temp = tempdir().expect("tempdir");
        let store = JsonFileCatalogStore::new(temp.path().join("cache"));
        let entry = CacheEntry::new(
            vec!["ADA".to_string(), "ETH".to_string()],
            UtcDateTime::from_unix_seconds(1_700_000_000).expect("valid"),
        );

        store.save("crypto_symbols", &entry).expect("save");

        let raw = fs::read_to_string(store.path_for("crypto_symbols").expect("path"))
            .expect("file written");
        let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert_eq!(json["symbols"][1], "ETH");

        assert_eq!(store.load("crypto_symbols").expect("load"), Some(entry));
    }

    #[test]
    fn missing_or_corrupt_file_reads_as_absent() {
        let temp = tempdir().expect("tempdir");
        let store = JsonFileCatalogStore::new(temp.path());
        assert_eq!(store.load("crypto_symbols").expect("load"), None);

        fs::write(
            store.path_for("crypto_symbols").expect("path"),
            "{\"symbols\": [\"ETH\"]",
        )
        .expect("write corrupt file");
        assert_eq!(store.load("crypto_symbols").expect("load"), None);
    }

    #[test]
    fn rejects_path_like_keys() {
        let store = JsonFileCatalogStore::new("/tmp");
        assert!(store.path_for("../etc/passwd").is_err());
        assert!(store.path_for("").is_err());
    }

    #[test]
    fn overlapping_writers_never_expose_partial_snapshot() {
        let temp = tempdir().expect("tempdir");
        let store = JsonFileCatalogStore::new(temp.path());
        let symbols: Vec<String> = (0..20_000).map(|n| format!("SYM{n}")).collect();
        let entry = CacheEntry::new(
            symbols,
            UtcDateTime::from_unix_seconds(1_700_000_000).expect("valid"),
        );
        store.save("crypto_symbols", &entry).expect("seed save");

        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        store.save("crypto_symbols", &entry).expect("save");
                    }
                });
            }
            for _ in 0..500 {
                let loaded = store.load("crypto_symbols").expect("load");
                assert_eq!(loaded.map(|entry| entry.symbols.len()), Some(20_000));
            }
        });

        let leftovers = fs::read_dir(temp.path()).expect("read dir").count();
        assert_eq!(leftovers, 1);
    }
}
