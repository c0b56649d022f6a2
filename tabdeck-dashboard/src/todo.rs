//! To-do list reducer.
//!
//! Plugs into [`tabdeck_sync::StorageReducer`] over the `to-do` store. An
//! absent state stays absent whatever the action.

use std::sync::Arc;

use tabdeck_core::ConfigurationError;
use tabdeck_storage::StorageInterface;
use tabdeck_sync::{StorageReducer, StoreManagerRegistry};
use uuid::Uuid;

use crate::models::{ToDoData, ToDoItemModel};

/// Fields of a to-do item to overwrite. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToDoPatch {
    pub title: Option<String>,
    pub is_completed: Option<bool>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToDoAction {
    AddToDo { title: String },
    EditToDo { id: String, data: ToDoPatch },
    RemoveToDo { id: String },
    EditCategory { category_id: String },
    /// Replace the whole list, e.g. with data synced from elsewhere.
    Sync { data: ToDoData },
}

pub fn to_do_reducer(state: Option<ToDoData>, action: ToDoAction) -> Option<ToDoData> {
    let mut state = state?;

    match action {
        ToDoAction::AddToDo { title } => {
            state.items.push(ToDoItemModel {
                id: Uuid::now_v7().to_string(),
                title,
                is_completed: false,
                category_id: state.category_id.clone(),
            });
        }
        ToDoAction::EditToDo { id, data } => {
            if let Some(item) = state.items.iter_mut().find(|item| item.id == id) {
                if let Some(title) = data.title {
                    item.title = title;
                }
                if let Some(is_completed) = data.is_completed {
                    item.is_completed = is_completed;
                }
                if let Some(category_id) = data.category_id {
                    item.category_id = category_id;
                }
            }
        }
        ToDoAction::RemoveToDo { id } => state.items.retain(|item| item.id != id),
        ToDoAction::EditCategory { category_id } => state.category_id = category_id,
        ToDoAction::Sync { data } => state = data,
    }

    Some(state)
}

/// Items of the category currently shown. Empty for an absent state.
pub fn select_active_category_items(state: Option<&ToDoData>) -> Vec<ToDoItemModel> {
    match state {
        Some(state) => state
            .items
            .iter()
            .filter(|item| item.category_id == state.category_id)
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}

pub type ToDoReducer = StorageReducer<ToDoData, ToDoAction>;

/// Attach a to-do reducer binding to `store`.
pub fn attach_to_do(
    registry: &Arc<StoreManagerRegistry>,
    store: Arc<dyn StorageInterface<ToDoData>>,
) -> Result<ToDoReducer, ConfigurationError> {
    StorageReducer::attach(registry, store, to_do_reducer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ARCHIVE, INBOX};

    fn item(id: &str, category_id: &str) -> ToDoItemModel {
        ToDoItemModel {
            id: id.to_string(),
            title: format!("task {id}"),
            is_completed: false,
            category_id: category_id.to_string(),
        }
    }

    fn state(items: Vec<ToDoItemModel>) -> Option<ToDoData> {
        Some(ToDoData {
            items,
            category_id: INBOX.id.to_string(),
        })
    }

    #[test]
    fn test_absent_state_stays_absent() {
        assert_eq!(
            to_do_reducer(None, ToDoAction::AddToDo { title: "x".to_string() }),
            None
        );
        assert!(select_active_category_items(None).is_empty());
    }

    #[test]
    fn test_add_uses_current_category() {
        let next = to_do_reducer(
            Some(ToDoData {
                items: vec![],
                category_id: ARCHIVE.id.to_string(),
            }),
            ToDoAction::AddToDo { title: "milk".to_string() },
        )
        .unwrap();

        assert_eq!(next.items.len(), 1);
        assert_eq!(next.items[0].title, "milk");
        assert_eq!(next.items[0].category_id, ARCHIVE.id);
        assert!(!next.items[0].is_completed);
        assert!(Uuid::parse_str(&next.items[0].id).is_ok());
    }

    #[test]
    fn test_edit_keeps_id_and_untouched_fields() {
        let next = to_do_reducer(
            state(vec![item("a", "1"), item("b", "1")]),
            ToDoAction::EditToDo {
                id: "b".to_string(),
                data: ToDoPatch {
                    is_completed: Some(true),
                    ..ToDoPatch::default()
                },
            },
        )
        .unwrap();

        assert_eq!(next.items[0], item("a", "1"));
        assert_eq!(next.items[1].id, "b");
        assert_eq!(next.items[1].title, "task b");
        assert!(next.items[1].is_completed);
    }

    #[test]
    fn test_remove_and_unknown_ids() {
        let start = state(vec![item("a", "1"), item("b", "2")]);

        let removed = to_do_reducer(start.clone(), ToDoAction::RemoveToDo { id: "a".to_string() }).unwrap();
        assert_eq!(removed.items, vec![item("b", "2")]);

        let unchanged = to_do_reducer(start.clone(), ToDoAction::RemoveToDo { id: "zz".to_string() });
        assert_eq!(unchanged, start);
    }

    #[test]
    fn test_selector_filters_by_category() {
        let mut data = state(vec![item("a", "1"), item("b", "2"), item("c", "1")]).unwrap();
        assert_eq!(
            select_active_category_items(Some(&data))
                .iter()
                .map(|i| i.id.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "c"]
        );

        data = to_do_reducer(
            Some(data),
            ToDoAction::EditCategory {
                category_id: ARCHIVE.id.to_string(),
            },
        )
        .unwrap();
        assert_eq!(select_active_category_items(Some(&data)), vec![item("b", "2")]);
    }

    #[test]
    fn test_sync_replaces_everything() {
        let incoming = ToDoData {
            items: vec![item("z", "2")],
            category_id: ARCHIVE.id.to_string(),
        };
        let next = to_do_reducer(
            state(vec![item("a", "1")]),
            ToDoAction::Sync { data: incoming.clone() },
        );
        assert_eq!(next, Some(incoming));
    }
}
