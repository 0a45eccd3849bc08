// Background Module - Extension service worker
//
// Handles:
// - Install/update lifecycle
// - Global keyboard commands (permanent and temporary whitelist toggles)
// - Toolbar badge state
// - Settings requests from page scripts

pub mod badge;
pub mod commands;
pub mod lifecycle;
pub mod messaging;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::notifications::Notifier;
use crate::settings::{Storage, StorageArea, StorageEvent, KEY_ENABLED};

pub use badge::{Badge, BadgeState, RecordedBadge};
pub use commands::{ActiveTab, Command, FixedTab};
pub use lifecycle::InstallReason;
pub use messaging::RuntimeMessage;

/// Events delivered to the background coordinator by the browser
#[derive(Debug)]
pub enum BackgroundEvent {
    Installed(InstallReason),
    /// Raw command name from the browser's command registry
    Command(String),
    Message {
        message: Value,
        reply: oneshot::Sender<Option<Value>>,
    },
}

pub struct Coordinator {
    storage: Storage,
    tabs: Arc<dyn ActiveTab>,
    notifier: Arc<dyn Notifier>,
    badge: Arc<dyn Badge>,
    version: String,
}

impl Coordinator {
    pub fn new(
        storage: Storage,
        tabs: Arc<dyn ActiveTab>,
        notifier: Arc<dyn Notifier>,
        badge: Arc<dyn Badge>,
    ) -> Self {
        Self {
            storage,
            tabs,
            notifier,
            badge,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the reported extension version (manifest version)
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Set the badge from the stored enabled flag
    pub async fn init_badge(&self) {
        let enabled = badge::enabled_from_value(self.storage.get_value(KEY_ENABLED).await.as_ref());
        self.badge.set_badge(&BadgeState::for_enabled(enabled));
    }

    pub async fn on_installed(&self, reason: &InstallReason) {
        lifecycle::on_installed(&self.storage, reason, &self.version).await;
    }

    /// Dispatch a command by name; unknown names are logged and dropped
    pub async fn on_command(&self, name: &str) -> Option<bool> {
        let command = match name.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                log::warn!("{}", e);
                return None;
            }
        };

        commands::handle_command(command, &self.storage, self.tabs.as_ref(), self.notifier.as_ref())
            .await
    }

    pub async fn on_message(&self, message: &Value) -> Option<Value> {
        messaging::handle_message(&self.storage, message).await
    }

    /// Keep the badge in step with the enabled flag
    pub fn on_storage_event(&self, event: &StorageEvent) {
        if let Some(enabled) = badge::enabled_change(event) {
            log::debug!("Extension {}", if enabled { "enabled" } else { "disabled" });
            self.badge.set_badge(&BadgeState::for_enabled(enabled));
        }
    }

    pub async fn handle_event(&self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Installed(reason) => self.on_installed(&reason).await,
            BackgroundEvent::Command(name) => {
                self.on_command(&name).await;
            }
            BackgroundEvent::Message { message, reply } => {
                let response = self.on_message(&message).await;
                if reply.send(response).is_err() {
                    log::debug!("Message sender went away before the reply");
                }
            }
        }
    }

    /// Initialise the badge, then serve browser events and sync-area changes
    /// until `events` closes
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<BackgroundEvent>) {
        let mut changes = self.storage.subscribe_area(StorageArea::Sync);
        self.init_badge().await;
        log::info!("Background coordinator initialized");

        loop {
            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                change = changes.recv() => match change {
                    Some(change) => self.on_storage_event(&change),
                    None => {
                        log::warn!("Storage change stream closed");
                        break;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationLog;
    use crate::settings::MemoryStorage;
    use serde_json::json;

    struct Harness {
        coordinator: Coordinator,
        storage: Storage,
        log: Arc<NotificationLog>,
        badge: Arc<RecordedBadge>,
    }

    fn harness(url: Option<&str>) -> Harness {
        let storage = Storage::new(Arc::new(MemoryStorage::new()));
        let log = Arc::new(NotificationLog::new());
        let badge = Arc::new(RecordedBadge::new());
        let tab = FixedTab {
            url: url.map(|u| u.to_string()),
        };
        let coordinator = Coordinator::new(storage.clone(), Arc::new(tab), log.clone(), badge.clone())
            .with_version("2.0.0");
        Harness {
            coordinator,
            storage,
            log,
            badge,
        }
    }

    #[tokio::test]
    async fn test_badge_initialised_from_store() {
        let h = harness(None);
        h.coordinator.init_badge().await;
        assert_eq!(h.badge.last(), Some(BadgeState::for_enabled(true)));

        h.storage.set_value("enabled", json!(false)).await;
        h.coordinator.init_badge().await;
        assert_eq!(h.badge.last().unwrap().text, "OFF");
    }

    #[tokio::test]
    async fn test_badge_follows_enabled_changes() {
        let h = harness(None);
        let mut sub = h.storage.subscribe();

        h.storage.set_value("enabled", json!(false)).await;
        h.coordinator.on_storage_event(&sub.recv().await.unwrap());
        assert_eq!(h.badge.last().unwrap().text, "OFF");

        h.storage.set_value("enabled", json!(true)).await;
        h.coordinator.on_storage_event(&sub.recv().await.unwrap());
        assert_eq!(h.badge.last().unwrap().text, "");
    }

    #[tokio::test]
    async fn test_unknown_command_is_ignored() {
        let h = harness(Some("https://example.com/"));
        assert_eq!(h.coordinator.on_command("reload-everything").await, None);
        assert!(h.log.is_empty());
    }

    #[tokio::test]
    async fn test_run_serves_events_until_closed() {
        let h = harness(Some("https://example.com/"));
        let (tx, rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();

        tx.send(BackgroundEvent::Installed(InstallReason::Install)).unwrap();
        tx.send(BackgroundEvent::Command("toggle-temp-whitelist".into()))
            .unwrap();
        tx.send(BackgroundEvent::Message {
            message: json!({ "type": "getSettings" }),
            reply: reply_tx,
        })
        .unwrap();
        drop(tx);

        h.coordinator.run(rx).await;

        assert_eq!(h.storage.temp_whitelist().await, vec!["example.com"]);
        assert_eq!(h.log.len(), 1);
        let settings = reply_rx.await.unwrap().unwrap();
        assert_eq!(settings["enabled"], json!(true));
        assert_eq!(h.badge.last(), Some(BadgeState::for_enabled(true)));
    }
}
