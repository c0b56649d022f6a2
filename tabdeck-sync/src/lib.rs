//! tabdeck Sync - shared store managers and binders
//!
//! A [`StoreManager`] owns the in-memory view of one keyed store and
//! serializes writes to it. The [`StoreManagerRegistry`] hands out one
//! manager per store and reference-counts its consumers. The binders in
//! [`binding`] project a manager (or, for [`SyncWithStorage`], the store
//! directly) into consumer-side state.

pub mod binding;
pub mod manager;
pub mod registry;
pub mod write;

pub use binding::{
    BindingView, FromStorage, PayloadMarker, ReducerView, StorageAction, StorageBinding,
    StorageReducer, SyncWithStorage,
};
pub use manager::{StoreManager, StoreManagerEvent};
pub use registry::StoreManagerRegistry;
pub use write::PendingWrite;
