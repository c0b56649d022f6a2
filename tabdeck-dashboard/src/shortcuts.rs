//! Shortcut list reducer.

use std::sync::Arc;

use tabdeck_core::ConfigurationError;
use tabdeck_storage::StorageInterface;
use tabdeck_sync::{StorageReducer, StoreManagerRegistry};
use uuid::Uuid;

use crate::models::{ShortcutItemModel, ShortcutsData};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutPatch {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutAction {
    AddShortcut { name: String, url: String },
    EditShortcut { id: String, data: ShortcutPatch },
    RemoveShortcut { id: String },
}

/// Trim `url` and prefix `https://` when it has no scheme.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if has_scheme(url) {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

pub fn shortcut_reducer(state: Option<ShortcutsData>, action: ShortcutAction) -> Option<ShortcutsData> {
    let mut state = state?;

    match action {
        ShortcutAction::AddShortcut { name, url } => state.items.push(ShortcutItemModel {
            id: Uuid::now_v7().to_string(),
            name: name.trim().to_string(),
            url: normalize_url(&url),
        }),
        ShortcutAction::EditShortcut { id, data } => {
            if let Some(item) = state.items.iter_mut().find(|item| item.id == id) {
                if let Some(name) = data.name {
                    item.name = name.trim().to_string();
                }
                if let Some(url) = data.url {
                    item.url = normalize_url(&url);
                }
            }
        }
        ShortcutAction::RemoveShortcut { id } => state.items.retain(|item| item.id != id),
    }

    Some(state)
}

pub type ShortcutReducer = StorageReducer<ShortcutsData, ShortcutAction>;

pub fn attach_shortcuts(
    registry: &Arc<StoreManagerRegistry>,
    store: Arc<dyn StorageInterface<ShortcutsData>>,
) -> Result<ShortcutReducer, ConfigurationError> {
    StorageReducer::attach(registry, store, shortcut_reducer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("  http://example.com "), "http://example.com");
        assert_eq!(normalize_url("chrome-extension://abc"), "chrome-extension://abc");
        assert_eq!(normalize_url("example.com/a?b=c://d"), "https://example.com/a?b=c://d");
    }

    #[test]
    fn test_add_edit_remove() {
        let state = shortcut_reducer(
            Some(ShortcutsData::default()),
            ShortcutAction::AddShortcut {
                name: " Mail ".to_string(),
                url: "mail.example.com".to_string(),
            },
        )
        .unwrap();
        let id = state.items[0].id.clone();
        assert_eq!(state.items[0].name, "Mail");
        assert_eq!(state.items[0].url, "https://mail.example.com");

        let state = shortcut_reducer(
            Some(state),
            ShortcutAction::EditShortcut {
                id: id.clone(),
                data: ShortcutPatch {
                    url: Some("http://mail.example.org".to_string()),
                    ..ShortcutPatch::default()
                },
            },
        )
        .unwrap();
        assert_eq!(state.items[0].id, id);
        assert_eq!(state.items[0].name, "Mail");
        assert_eq!(state.items[0].url, "http://mail.example.org");

        let state = shortcut_reducer(Some(state), ShortcutAction::RemoveShortcut { id }).unwrap();
        assert!(state.items.is_empty());
    }

    #[test]
    fn test_absent_state_stays_absent() {
        let action = ShortcutAction::RemoveShortcut { id: "a".to_string() };
        assert_eq!(shortcut_reducer(None, action), None);
    }
}
