//! LMDB-backed medium.
//!
//! Uses the heed crate (Rust bindings for LMDB). LMDB environments can be
//! opened by several processes at once, so writes made by one dashboard
//! process show up in another; [`crate::namespace::Namespace::poll_external_changes`]
//! turns those into external change events.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The medium uses:
//! - Read transactions for `get`
//! - Write transactions for `set` and `remove`

use std::path::Path;

use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use tabdeck_core::StorageError;

use super::PersistenceMedium;

/// Error type for opening an LMDB medium.
#[derive(Debug, thiserror::Error)]
pub enum LmdbMediumError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbMediumError> for StorageError {
    fn from(e: LmdbMediumError) -> Self {
        StorageError::MediumUnavailable {
            reason: e.to_string(),
        }
    }
}

/// LMDB medium with a single unnamed database of UTF-8 keys and values.
///
/// # Example
///
/// ```ignore
/// let medium = LmdbMedium::open("/var/lib/tabdeck", 16)?;
/// medium.set("ps:settings", r#"{"isClockEnabled":true}"#)?;
/// ```
pub struct LmdbMedium {
    env: Env,
    db: Database<Str, Str>,
}

impl LmdbMedium {
    /// Open (or create) an LMDB medium.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbMediumError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per medium and the map size
        // is fixed for its lifetime.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbMediumError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbMediumError::Transaction(e.to_string()))?;

        let db: Database<Str, Str> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbMediumError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbMediumError::Transaction(e.to_string()))?;

        Ok(Self { env, db })
    }

    /// Number of stored keys.
    pub fn len(&self) -> Result<u64, StorageError> {
        let rtxn = self.env.read_txn().map_err(|e| StorageError::ReadFailed {
            key: "*".to_string(),
            reason: e.to_string(),
        })?;
        self.db.len(&rtxn).map_err(|e| StorageError::ReadFailed {
            key: "*".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }
}

impl PersistenceMedium for LmdbMedium {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let read_failed = |e: heed::Error| StorageError::ReadFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let rtxn = self.env.read_txn().map_err(read_failed)?;
        let value = self.db.get(&rtxn, key).map_err(read_failed)?;
        Ok(value.map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let write_failed = |e: heed::Error| StorageError::WriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let mut wtxn = self.env.write_txn().map_err(write_failed)?;
        self.db.put(&mut wtxn, key, value).map_err(write_failed)?;
        wtxn.commit().map_err(write_failed)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let remove_failed = |e: heed::Error| StorageError::RemoveFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let mut wtxn = self.env.write_txn().map_err(remove_failed)?;
        self.db.delete(&mut wtxn, key).map_err(remove_failed)?;
        wtxn.commit().map_err(remove_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_medium() -> (LmdbMedium, TempDir) {
        let temp_dir = TempDir::new().expect("create temp dir");
        let medium = LmdbMedium::open(temp_dir.path(), 10).expect("open medium");
        (medium, temp_dir)
    }

    #[test]
    fn test_set_and_get() {
        let (medium, _temp_dir) = create_test_medium();

        medium.set("ps:quote", r#"{"createdAt":1,"data":"x"}"#).expect("set should succeed");

        let value = medium.get("ps:quote").expect("get should succeed");
        assert_eq!(value.as_deref(), Some(r#"{"createdAt":1,"data":"x"}"#));
        assert_eq!(medium.len().expect("len"), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let (medium, _temp_dir) = create_test_medium();
        assert_eq!(medium.get("ps:nothing").expect("get should succeed"), None);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let (medium, _temp_dir) = create_test_medium();

        medium.set("ps:k", "1").expect("set");
        medium.set("ps:k", "2").expect("set");
        assert_eq!(medium.get("ps:k").expect("get").as_deref(), Some("2"));

        medium.remove("ps:k").expect("remove");
        assert_eq!(medium.get("ps:k").expect("get"), None);
        medium.remove("ps:k").expect("removing twice is fine");
        assert!(medium.is_empty().expect("is_empty"));
    }

    #[test]
    fn test_second_handle_sees_writes() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let first = LmdbMedium::open(temp_dir.path(), 10).expect("open first");
        first.set("ps:shared", "\"hello\"").expect("set");
        drop(first);

        let second = LmdbMedium::open(temp_dir.path(), 10).expect("open second");
        assert_eq!(second.get("ps:shared").expect("get").as_deref(), Some("\"hello\""));
    }
}
