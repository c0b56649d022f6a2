//! Peripheral notification mechanism.
//!
//! The sync core never surfaces write failures as return values; it reports
//! them here. Whatever sits in front of the user subscribes to
//! [`NotificationCenter::event`] and shows them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

use crate::pubsub::{PubSub, PubSubEvent};

/// How many recent notifications a center remembers.
const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs every notification and fans it out to subscribers.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    hub: PubSub<Notification>,
    history: Mutex<VecDeque<Notification>>,
}

static GLOBAL_CENTER: Lazy<Arc<NotificationCenter>> =
    Lazy::new(|| Arc::new(NotificationCenter::new()));

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide center.
    pub fn global() -> Arc<NotificationCenter> {
        Arc::clone(&GLOBAL_CENTER)
    }

    pub fn event(&self) -> &dyn PubSubEvent<Notification> {
        self.hub.event()
    }

    /// Most recent notifications, oldest first.
    pub fn recent(&self) -> Vec<Notification> {
        self.history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => tracing::error!(message = %notification.message, "notification"),
            NotificationLevel::Warning => tracing::warn!(message = %notification.message, "notification"),
            NotificationLevel::Info | NotificationLevel::Success => {
                tracing::info!(message = %notification.message, "notification")
            }
        }

        {
            let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(notification.clone());
        }

        self.hub.publish(&notification);
    }
}
