//! Process-local medium.

use std::collections::HashMap;
use std::sync::RwLock;

use tabdeck_core::StorageError;

use super::PersistenceMedium;

/// `HashMap`-backed medium. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryMedium {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

impl PersistenceMedium for InMemoryMedium {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.read().map_err(|_| StorageError::ReadFailed {
            key: key.to_string(),
            reason: "medium lock poisoned".to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::WriteFailed {
            key: key.to_string(),
            reason: "medium lock poisoned".to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(|_| StorageError::RemoveFailed {
            key: key.to_string(),
            reason: "medium lock poisoned".to_string(),
        })?;
        entries.remove(key);
        Ok(())
    }
}
