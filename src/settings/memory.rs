// In-memory storage backend
//
// Holds both storage areas in process memory and broadcasts change events
// the same way the browser's storage API does. Used by headless hosts and
// by the test suites of every module.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use super::storage::{Keys, StorageArea, StorageBackend, StorageChange, StorageEvent};
use crate::error::{StoreError, StoreResult};

/// Capacity of the change broadcast channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

pub struct MemoryStorage {
    sync: Mutex<Map<String, Value>>,
    local: Mutex<Map<String, Value>>,
    available: AtomicBool,
    sender: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            sync: Mutex::new(Map::new()),
            local: Mutex::new(Map::new()),
            available: AtomicBool::new(true),
            sender,
        }
    }

    /// Simulate the store going away; every operation fails while false
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn area(&self, area: StorageArea) -> &Mutex<Map<String, Value>> {
        match area {
            StorageArea::Sync => &self.sync,
            StorageArea::Local => &self.local,
        }
    }

    fn check_available(&self, area: StorageArea) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(area.as_str().to_string()))
        }
    }

    /// Apply `mutate` to an area and broadcast whatever actually changed
    fn commit<F>(&self, area: StorageArea, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Map<String, Value>) -> BTreeMap<String, StorageChange>,
    {
        self.check_available(area)?;

        let changes = {
            let mut map = self
                .area(area)
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("{} lock poisoned: {}", area.as_str(), e)))?;
            mutate(&mut *map)
        };

        if !changes.is_empty() {
            log::debug!("Storage {} changed: {:?}", area.as_str(), changes.keys());
            // No receivers is not an error
            let _ = self.sender.send(StorageEvent { area, changes });
        }

        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, area: StorageArea, keys: &Keys) -> StoreResult<Map<String, Value>> {
        self.check_available(area)?;

        let map = self
            .area(area)
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("{} lock poisoned: {}", area.as_str(), e)))?;

        Ok(map
            .iter()
            .filter(|(k, _)| keys.includes(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn set(&self, area: StorageArea, items: Map<String, Value>) -> StoreResult<()> {
        self.commit(area, |map| {
            let mut changes = BTreeMap::new();
            for (key, value) in items {
                let old_value = map.insert(key.clone(), value.clone());
                if old_value.as_ref() != Some(&value) {
                    changes.insert(
                        key,
                        StorageChange {
                            old_value,
                            new_value: Some(value),
                        },
                    );
                }
            }
            changes
        })
    }

    async fn remove(&self, area: StorageArea, keys: &[String]) -> StoreResult<()> {
        self.commit(area, |map| {
            let mut changes = BTreeMap::new();
            for key in keys {
                if let Some(old_value) = map.remove(key) {
                    changes.insert(
                        key.clone(),
                        StorageChange {
                            old_value: Some(old_value),
                            new_value: None,
                        },
                    );
                }
            }
            changes
        })
    }

    async fn clear(&self, area: StorageArea) -> StoreResult<()> {
        self.commit(area, |map| {
            std::mem::take(map)
                .into_iter()
                .map(|(key, old_value)| {
                    (
                        key,
                        StorageChange {
                            old_value: Some(old_value),
                            new_value: None,
                        },
                    )
                })
                .collect()
        })
    }

    fn changes(&self) -> broadcast::Receiver<StorageEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_set_reports_only_changed_keys() {
        let store = MemoryStorage::new();
        let mut rx = store.changes();

        store
            .set(StorageArea::Sync, items(&[("enabled", json!(true)), ("theme", json!("auto"))]))
            .await
            .unwrap();
        let first = rx.try_recv().unwrap();
        assert_eq!(first.changes.len(), 2);

        store
            .set(StorageArea::Sync, items(&[("enabled", json!(true)), ("theme", json!("dark"))]))
            .await
            .unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(second.changes.len(), 1);
        assert_eq!(second.changes["theme"].old_value, Some(json!("auto")));
        assert_eq!(second.changes["theme"].new_value, Some(json!("dark")));

        // Rewriting identical values is silent
        store
            .set(StorageArea::Sync, items(&[("theme", json!("dark"))]))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_reports_removed_keys() {
        let store = MemoryStorage::new();
        store
            .set(StorageArea::Local, items(&[("tempWhitelist", json!(["a.com"]))]))
            .await
            .unwrap();
        let mut rx = store.changes();

        store.clear(StorageArea::Local).await.unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.area, StorageArea::Local);
        assert_eq!(event.changes["tempWhitelist"].new_value, None);

        // Clearing an empty area produces no event
        store.clear(StorageArea::Local).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_areas_are_independent() {
        let store = MemoryStorage::new();
        store
            .set(StorageArea::Local, items(&[("whitelist", json!(["a.com"]))]))
            .await
            .unwrap();

        let sync = store.get(StorageArea::Sync, &Keys::All).await.unwrap();
        assert!(sync.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_every_operation() {
        let store = MemoryStorage::new();
        store.set_available(false);

        assert!(store.get(StorageArea::Sync, &Keys::All).await.is_err());
        assert!(store.set(StorageArea::Sync, Map::new()).await.is_err());
        assert!(store.remove(StorageArea::Local, &[]).await.is_err());
        assert!(matches!(
            store.clear(StorageArea::Sync).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
