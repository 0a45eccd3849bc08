// Notifications Module - System notifications
//
// Handles:
// - Notification payloads shown by the browser after background commands
// - The `Notifier` sink implemented by hosts
// - An in-memory log used by headless hosts and tests

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Icon bundled with the extension, resolved by the host
pub const NOTIFICATION_ICON: &str = "icons/icon-128.png";

/// Template of a browser notification. Only plain icon/title/message
/// notifications are shown.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Basic,
}

/// Notification payload handed to the browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub icon_url: String,
    pub source: Option<String>,
    pub timestamp: i64, // Unix timestamp in milliseconds
}

impl NotificationPayload {
    /// Create a basic notification with a generated UUID
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: NotificationKind::Basic,
            title: title.into(),
            message: message.into(),
            icon_url: NOTIFICATION_ICON.to_string(),
            source: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Set the source of the notification (e.g., "command", "lifecycle")
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Destination for system notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: NotificationPayload);
}

/// Hand a notification to the host's notifier
pub fn emit_notification(notifier: &dyn Notifier, notification: NotificationPayload) {
    log::debug!(
        "Emitting notification: {} - {}",
        notification.title,
        notification.message
    );
    notifier.notify(notification);
}

/// Notifier that keeps every notification in memory
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<NotificationPayload>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<NotificationPayload> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(e) => {
                log::error!("Failed to lock notification log: {}", e);
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NotificationLog {
    fn notify(&self, notification: NotificationPayload) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(notification),
            Err(e) => log::error!("Failed to lock notification log: {}", e),
        }
    }
}

// ==================== Helper Functions for Common Notifications ====================

/// Emit the result of toggling a site in the permanent whitelist
pub fn notify_whitelist_toggled(notifier: &dyn Notifier, hostname: &str, whitelisted: bool) {
    let (title, outcome) = if whitelisted {
        ("Site Whitelisted", "will not be blurred")
    } else {
        ("Site Removed from Whitelist", "will be blurred")
    };

    let notification = NotificationPayload::new(title, format!("{} {}", hostname, outcome))
        .with_source("command");

    emit_notification(notifier, notification);
}

/// Emit the result of toggling a site in the temporary whitelist
pub fn notify_temp_whitelist_toggled(notifier: &dyn Notifier, hostname: &str, whitelisted: bool) {
    let (title, outcome) = if whitelisted {
        (
            "Site Temporarily Whitelisted",
            "will not be blurred until browser closes",
        )
    } else {
        ("Site Removed from Temporary Whitelist", "will be blurred")
    };

    let notification = NotificationPayload::new(title, format!("{} {}", hostname, outcome))
        .with_source("command");

    emit_notification(notifier, notification);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_serializes_for_browser() {
        let payload = NotificationPayload::new("Title", "Body").with_source("command");
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "basic");
        assert_eq!(json["title"], "Title");
        assert_eq!(json["message"], "Body");
        assert_eq!(json["iconUrl"], NOTIFICATION_ICON);
        assert_eq!(json["source"], "command");
        assert!(json["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_whitelist_messages() {
        let log = NotificationLog::new();
        notify_whitelist_toggled(&log, "example.com", true);
        notify_whitelist_toggled(&log, "example.com", false);
        notify_temp_whitelist_toggled(&log, "example.com", true);
        notify_temp_whitelist_toggled(&log, "example.com", false);

        let entries = log.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].title, "Site Whitelisted");
        assert_eq!(entries[0].message, "example.com will not be blurred");
        assert_eq!(entries[1].title, "Site Removed from Whitelist");
        assert_eq!(entries[1].message, "example.com will be blurred");
        assert_eq!(entries[2].title, "Site Temporarily Whitelisted");
        assert_eq!(
            entries[2].message,
            "example.com will not be blurred until browser closes"
        );
        assert_eq!(entries[3].title, "Site Removed from Temporary Whitelist");
        assert_ne!(entries[0].id, entries[1].id);
    }
}
