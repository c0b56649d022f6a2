//! Error types for tabdeck operations

use thiserror::Error;

/// Persistence layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Item not found: {key}")]
    NotFound { key: String },

    #[error("Read failed for {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    #[error("Write failed for {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    #[error("Remove failed for {key}: {reason}")]
    RemoveFailed { key: String, reason: String },

    #[error("Serialization failed for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Persistence medium unavailable: {reason}")]
    MediumUnavailable { reason: String },
}

/// Async cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid TTL: {millis}ms")]
    InvalidTtl { millis: i64 },

    #[error("Source is not defined (re. {key})")]
    SourceNotDefined { key: String },

    #[error("Could not load data from source (re. {key}): {reason}")]
    SourceUnavailable { key: String, reason: String },
}

/// Programmer errors. These are never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Key is already taken: {key}")]
    KeyTaken { key: String },

    #[error("Provided subscriber is already subscribed")]
    DuplicateSubscriber,

    #[error("Cannot set data to the {key} storage until it is not initialized")]
    NotInitialized { key: String },

    #[error("Cannot dispatch data before initialization (re. {key})")]
    DispatchBeforeInit { key: String },

    #[error("Orphan subscribers detected while destroying a storage manager instance ({key}: {count})")]
    OrphanSubscribers { key: String, count: usize },

    #[error("Storage manager for {key} was registered with a different data type")]
    ManagerTypeMismatch { key: String },
}

/// Master error type for all tabdeck errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TabdeckError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl TabdeckError {
    /// Absence of a key. Callers translate this into "use default or empty".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(StorageError::NotFound { .. }))
    }

    /// Programmer errors (duplicate registration, use before init, ...).
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result type alias for tabdeck operations.
pub type TabdeckResult<T> = Result<T, TabdeckError>;

// =============================================================================
// TESTS
// =============================================================================
