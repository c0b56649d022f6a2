//! The dashboard's keyed stores.

use std::sync::Arc;

use tabdeck_core::ConfigurationError;
use tabdeck_storage::{Namespace, PersistedStorage, StorageInterface};

use crate::models::{SettingsModel, ShortcutsData, ToDoData};

pub const SETTINGS_KEY: &str = "settings";
pub const SHORTCUTS_KEY: &str = "shortcuts";
pub const TO_DO_KEY: &str = "to-do";

/// One handle per store. Cloning shares the stores.
#[derive(Clone)]
pub struct DashboardStores {
    pub settings: Arc<dyn StorageInterface<SettingsModel>>,
    pub shortcuts: Arc<dyn StorageInterface<ShortcutsData>>,
    pub to_do: Arc<dyn StorageInterface<ToDoData>>,
}

impl DashboardStores {
    /// Register the stores in `namespace`. Fails if any key is taken.
    pub fn create(namespace: &Arc<Namespace>) -> Result<Self, ConfigurationError> {
        Ok(Self {
            settings: PersistedStorage::new(namespace, SETTINGS_KEY, Some(SettingsModel::default()))?,
            shortcuts: PersistedStorage::new(namespace, SHORTCUTS_KEY, Some(ShortcutsData::default()))?,
            to_do: PersistedStorage::new(namespace, TO_DO_KEY, Some(ToDoData::default()))?,
        })
    }
}

impl std::fmt::Debug for DashboardStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardStores")
            .field("keys", &[self.settings.key(), self.shortcuts.key(), self.to_do.key()])
            .finish()
    }
}
