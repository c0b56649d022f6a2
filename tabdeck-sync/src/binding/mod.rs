//! Binders projecting stores into consumer state.
//!
//! - [`StorageBinding`]: value binder over the shared manager.
//! - [`FromStorage`]: the same, read-only.
//! - [`StorageReducer`]: reducer binder; local actions run through a
//!   reducer and are persisted, store changes hydrate the reducer.
//! - [`SyncWithStorage`]: keeps caller-owned data in step with a store
//!   without a manager.

pub mod from_storage;
pub mod reducer;
pub mod sync;
pub mod value;

pub use from_storage::FromStorage;
pub use reducer::{PayloadMarker, ReducerView, StorageAction, StorageReducer};
pub use sync::SyncWithStorage;
pub use value::{BindingView, StorageBinding};

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}
