//! Data the dashboard persists. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsModel {
    pub is_clock_enabled: bool,
    pub is_greeting_enabled: bool,
    pub is_greeting_with_name: bool,
    pub is_search_enabled: bool,
    pub is_shortcuts_enabled: bool,
    pub is_quote_enabled: bool,
}

impl Default for SettingsModel {
    fn default() -> Self {
        Self {
            is_clock_enabled: true,
            is_greeting_enabled: false,
            is_greeting_with_name: false,
            is_search_enabled: true,
            is_shortcuts_enabled: true,
            is_quote_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutItemModel {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToDoItemModel {
    pub id: String,
    pub title: String,
    pub is_completed: bool,
    pub category_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToDoCategoryModel {
    pub id: &'static str,
    pub name: &'static str,
}

pub const INBOX: ToDoCategoryModel = ToDoCategoryModel { id: "1", name: "Inbox" };
pub const ARCHIVE: ToDoCategoryModel = ToDoCategoryModel { id: "2", name: "Archive" };

/// Categories in display order. The first one is the default.
pub const TO_DO_CATEGORIES: [ToDoCategoryModel; 2] = [INBOX, ARCHIVE];

pub fn find_category(id: &str) -> Option<ToDoCategoryModel> {
    TO_DO_CATEGORIES.iter().copied().find(|c| c.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteModel {
    pub text: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAuthor {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageModel {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<ImageAuthor>,
}

/// Contents of the `shortcuts` store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutsData {
    pub items: Vec<ShortcutItemModel>,
}

/// Contents of the `to-do` store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToDoData {
    pub items: Vec<ToDoItemModel>,
    /// Category whose items are shown.
    pub category_id: String,
}

impl Default for ToDoData {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            category_id: TO_DO_CATEGORIES[0].id.to_string(),
        }
    }
}
