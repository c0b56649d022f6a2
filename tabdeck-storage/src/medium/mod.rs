//! Durable key-value media behind the persisted stores.
//!
//! A medium is deliberately dumb: synchronous string get/set/remove. Keys
//! arriving here are already namespaced. Change notification is not the
//! medium's job, see [`crate::namespace::Namespace`].

pub mod lmdb;
pub mod memory;

pub use lmdb::LmdbMedium;
pub use memory::InMemoryMedium;

use tabdeck_core::StorageError;

/// Synchronous string key-value persistence.
pub trait PersistenceMedium: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a key. Deleting an absent key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
