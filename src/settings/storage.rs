// Storage Abstraction Layer
//
// Handles:
// - The key-value backend contract (sync + local areas)
// - Change notifications and subscriptions
// - The `Storage` facade: defaults merging and graceful degradation

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::types::{Settings, KEY_TEMP_WHITELIST};
use crate::error::StoreResult;

/// Storage area a key lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageArea {
    /// Synchronized across the user's devices
    Sync,
    /// Local to this browser session
    Local,
}

impl StorageArea {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageArea::Sync => "sync",
            StorageArea::Local => "local",
        }
    }
}

/// Before/after values of a single key. `None` means absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageChange {
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Changes committed by one store operation
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub area: StorageArea,
    pub changes: BTreeMap<String, StorageChange>,
}

/// Keys to read from an area
#[derive(Debug, Clone)]
pub enum Keys {
    /// Everything stored in the area
    All,
    /// Only the listed keys
    Only(Vec<String>),
}

impl Keys {
    pub fn one(key: &str) -> Self {
        Keys::Only(vec![key.to_string()])
    }

    pub fn includes(&self, key: &str) -> bool {
        match self {
            Keys::All => true,
            Keys::Only(keys) => keys.iter().any(|k| k == key),
        }
    }
}

/// Raw key-value store backing both areas
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read stored values; absent keys are simply missing from the map
    async fn get(&self, area: StorageArea, keys: &Keys) -> StoreResult<Map<String, Value>>;
    async fn set(&self, area: StorageArea, items: Map<String, Value>) -> StoreResult<()>;
    async fn remove(&self, area: StorageArea, keys: &[String]) -> StoreResult<()>;
    async fn clear(&self, area: StorageArea) -> StoreResult<()>;
    /// Receiver for every change committed to either area
    fn changes(&self) -> broadcast::Receiver<StorageEvent>;
}

/// Handle for a change subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<StorageEvent>,
    area: Option<StorageArea>,
}

impl Subscription {
    pub fn new(receiver: broadcast::Receiver<StorageEvent>, area: Option<StorageArea>) -> Self {
        Self { receiver, area }
    }

    /// Wait for the next event in the subscribed area.
    ///
    /// Returns `None` once the backend has been dropped.
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    log::warn!("Storage subscriber lagged, {} change events dropped", count);
                    continue;
                }
            };

            if self.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Take the next pending event without waiting
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}

    fn matches(&self, event: &StorageEvent) -> bool {
        self.area.map_or(true, |area| area == event.area)
    }
}

/// Storage facade shared by every extension context.
///
/// Backend failures are logged and replaced with defaults (reads) or
/// dropped (writes). The `try_*` methods are the exception.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
}

impl Storage {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Read sync-area values with defaults merged for missing keys.
    ///
    /// Unknown keys have no default and are only returned when stored.
    pub async fn get(&self, keys: Keys) -> Map<String, Value> {
        let defaults = Settings::default_map();
        let mut merged: Map<String, Value> = defaults
            .into_iter()
            .filter(|(k, _)| keys.includes(k))
            .collect();

        match self.backend.get(StorageArea::Sync, &keys).await {
            Ok(stored) => merged.extend(stored),
            Err(e) => log::error!("Storage get error: {}", e),
        }

        merged
    }

    /// Read a single sync-area value, falling back to its default
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        self.get(Keys::one(key)).await.remove(key)
    }

    /// Full settings snapshot
    pub async fn settings(&self) -> Settings {
        Settings::from_map(&self.get(Keys::All).await)
    }

    pub async fn set(&self, items: Map<String, Value>) {
        if let Err(e) = self.backend.set(StorageArea::Sync, items).await {
            log::error!("Storage set error: {}", e);
        }
    }

    /// Store a single sync-area key
    pub async fn set_value(&self, key: &str, value: Value) {
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        self.set(items).await;
    }

    pub async fn remove(&self, keys: &[String]) {
        if let Err(e) = self.backend.remove(StorageArea::Sync, keys).await {
            log::error!("Storage remove error: {}", e);
        }
    }

    pub async fn clear(&self) {
        if let Err(e) = self.backend.clear(StorageArea::Sync).await {
            log::error!("Storage clear error: {}", e);
        }
    }

    // ==================== Session Whitelist ====================

    /// Temporary whitelist from the local area (empty on failure)
    pub async fn temp_whitelist(&self) -> Vec<String> {
        let stored = match self
            .backend
            .get(StorageArea::Local, &Keys::one(KEY_TEMP_WHITELIST))
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                log::error!("Storage get error (local): {}", e);
                return Vec::new();
            }
        };

        parse_host_list(stored.get(KEY_TEMP_WHITELIST))
    }

    pub async fn set_temp_whitelist(&self, hosts: Vec<String>) {
        let mut items = Map::new();
        items.insert(KEY_TEMP_WHITELIST.to_string(), Value::from(hosts));
        if let Err(e) = self.backend.set(StorageArea::Local, items).await {
            log::error!("Storage set error (local): {}", e);
        }
    }

    pub async fn clear_temp_whitelist(&self) {
        let keys = [KEY_TEMP_WHITELIST.to_string()];
        if let Err(e) = self.backend.remove(StorageArea::Local, &keys).await {
            log::error!("Storage remove error (local): {}", e);
        }
    }

    // ==================== Read-Modify-Write ====================
    //
    // Multi-step flows must not write back a list they failed to read, so
    // these surface backend errors instead of degrading to defaults.

    /// Read a single sync-area value; a missing key reads as its default
    pub async fn try_get_value(&self, key: &str) -> Result<Option<Value>> {
        let mut stored = self
            .backend
            .get(StorageArea::Sync, &Keys::one(key))
            .await
            .with_context(|| format!("Failed to read '{}'", key))?;

        Ok(stored
            .remove(key)
            .or_else(|| Settings::default_map().remove(key)))
    }

    pub async fn try_set_value(&self, key: &str, value: Value) -> Result<()> {
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        self.backend
            .set(StorageArea::Sync, items)
            .await
            .with_context(|| format!("Failed to write '{}'", key))
    }

    pub async fn try_temp_whitelist(&self) -> Result<Vec<String>> {
        let stored = self
            .backend
            .get(StorageArea::Local, &Keys::one(KEY_TEMP_WHITELIST))
            .await
            .context("Failed to read the temporary whitelist")?;

        Ok(parse_host_list(stored.get(KEY_TEMP_WHITELIST)))
    }

    pub async fn try_set_temp_whitelist(&self, hosts: Vec<String>) -> Result<()> {
        let mut items = Map::new();
        items.insert(KEY_TEMP_WHITELIST.to_string(), Value::from(hosts));
        self.backend
            .set(StorageArea::Local, items)
            .await
            .context("Failed to write the temporary whitelist")
    }

    // ==================== Subscriptions ====================

    /// Subscribe to changes in every area
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.backend.changes(), None)
    }

    /// Subscribe to changes in a single area
    pub fn subscribe_area(&self, area: StorageArea) -> Subscription {
        Subscription::new(self.backend.changes(), Some(area))
    }
}

/// Decode a stored hostname list; anything malformed reads as empty
pub fn parse_host_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value::<Vec<String>>(v.clone()).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed hostname list: {}", e);
            Vec::new()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::memory::MemoryStorage;
    use crate::settings::types::Theme;
    use serde_json::json;

    fn storage() -> (Arc<MemoryStorage>, Storage) {
        let backend = Arc::new(MemoryStorage::new());
        (backend.clone(), Storage::new(backend))
    }

    #[tokio::test]
    async fn test_get_merges_defaults() {
        let (_, storage) = storage();
        storage.set_value("blurValue", json!(70)).await;

        let values = storage.get(Keys::All).await;
        assert_eq!(values["blurValue"], json!(70));
        assert_eq!(values["minImageSize"], json!(40));
        assert_eq!(values["theme"], json!("auto"));
    }

    #[tokio::test]
    async fn test_get_single_key() {
        let (_, storage) = storage();
        assert_eq!(storage.get_value("enabled").await, Some(json!(true)));
        assert_eq!(storage.get_value("unknown").await, None);

        storage.set_value("enabled", json!(false)).await;
        assert_eq!(storage.get_value("enabled").await, Some(json!(false)));
    }

    #[tokio::test]
    async fn test_get_only_requested_keys() {
        let (_, storage) = storage();
        let values = storage
            .get(Keys::Only(vec!["whitelist".into(), "theme".into()]))
            .await;
        assert_eq!(values.len(), 2);
        assert!(values.contains_key("whitelist"));
        assert!(values.contains_key("theme"));
    }

    #[tokio::test]
    async fn test_unavailable_store_degrades_to_defaults() {
        let (backend, storage) = storage();
        storage.set_value("theme", json!("dark")).await;
        backend.set_available(false);

        assert_eq!(storage.settings().await, Settings::default());
        assert!(storage.temp_whitelist().await.is_empty());

        // Writes are dropped, not propagated
        storage.set_value("theme", json!("light")).await;
        storage.clear().await;

        backend.set_available(true);
        assert_eq!(storage.settings().await.theme, Theme::Dark);
    }

    #[tokio::test]
    async fn test_fallible_access_reports_errors() {
        let (backend, storage) = storage();
        assert_eq!(storage.try_get_value("whitelist").await.unwrap(), Some(json!([])));
        assert_eq!(storage.try_get_value("unknown").await.unwrap(), None);

        storage.try_set_value("whitelist", json!(["a.com"])).await.unwrap();
        storage
            .try_set_temp_whitelist(vec!["b.com".to_string()])
            .await
            .unwrap();
        assert_eq!(storage.try_temp_whitelist().await.unwrap(), vec!["b.com"]);

        backend.set_available(false);
        assert!(storage.try_get_value("whitelist").await.is_err());
        assert!(storage.try_set_value("whitelist", json!([])).await.is_err());
        assert!(storage.try_temp_whitelist().await.is_err());

        backend.set_available(true);
        assert_eq!(storage.settings().await.whitelist, vec!["a.com"]);
    }

    #[tokio::test]
    async fn test_remove_and_clear_restore_defaults() {
        let (_, storage) = storage();
        storage.set_value("minImageSize", json!(90)).await;
        storage.set_value("enabled", json!(false)).await;

        storage.remove(&["minImageSize".to_string()]).await;
        let settings = storage.settings().await;
        assert_eq!(settings.min_image_size, 40);
        assert!(!settings.enabled);

        storage.clear().await;
        assert_eq!(storage.settings().await, Settings::default());
    }

    #[tokio::test]
    async fn test_temp_whitelist_lives_in_local_area() {
        let (_, storage) = storage();
        storage
            .set_temp_whitelist(vec!["example.com".to_string()])
            .await;

        assert_eq!(storage.temp_whitelist().await, vec!["example.com"]);
        assert!(storage.settings().await.whitelist.is_empty());

        storage.clear_temp_whitelist().await;
        assert!(storage.temp_whitelist().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscription_filters_by_area() {
        let (_, storage) = storage();
        let mut sync_only = storage.subscribe_area(StorageArea::Sync);
        let mut all = storage.subscribe();

        storage
            .set_temp_whitelist(vec!["example.com".to_string()])
            .await;
        storage.set_value("enabled", json!(false)).await;

        let event = sync_only.recv().await.expect("sync event");
        assert_eq!(event.area, StorageArea::Sync);
        assert_eq!(
            event.changes["enabled"],
            StorageChange {
                old_value: None,
                new_value: Some(json!(false)),
            }
        );
        assert!(sync_only.try_recv().is_none());

        assert_eq!(all.try_recv().map(|e| e.area), Some(StorageArea::Local));
        assert_eq!(all.try_recv().map(|e| e.area), Some(StorageArea::Sync));
    }

    #[test]
    fn test_parse_host_list() {
        assert!(parse_host_list(None).is_empty());
        assert!(parse_host_list(Some(&json!(42))).is_empty());
        assert_eq!(parse_host_list(Some(&json!(["a.com"]))), vec!["a.com"]);
    }
}
