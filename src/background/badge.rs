// Toolbar badge
//
// Shows "OFF" on the extension icon while blurring is globally disabled.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::{StorageArea, StorageEvent, KEY_ENABLED};

pub const BADGE_OFF_TEXT: &str = "OFF";
pub const BADGE_COLOR: &str = "#ef4444";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeState {
    pub text: String,
    pub background_color: String,
}

impl BadgeState {
    pub fn for_enabled(enabled: bool) -> Self {
        Self {
            text: if enabled { String::new() } else { BADGE_OFF_TEXT.to_string() },
            background_color: BADGE_COLOR.to_string(),
        }
    }
}

/// Host surface for the toolbar badge
pub trait Badge: Send + Sync {
    fn set_badge(&self, state: &BadgeState);
}

/// Badge that remembers the last state it was given
#[derive(Debug, Default)]
pub struct RecordedBadge {
    last: Mutex<Option<BadgeState>>,
}

impl RecordedBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<BadgeState> {
        self.last.lock().ok().and_then(|state| state.clone())
    }
}

impl Badge for RecordedBadge {
    fn set_badge(&self, state: &BadgeState) {
        match self.last.lock() {
            Ok(mut last) => *last = Some(state.clone()),
            Err(e) => log::error!("Failed to lock badge state: {}", e),
        }
    }
}

/// Interpret a stored `enabled` value; anything but an explicit `false`
/// counts as enabled
pub fn enabled_from_value(value: Option<&Value>) -> bool {
    !matches!(value, Some(Value::Bool(false)))
}

/// New enabled flag carried by a sync change event, if it touched `enabled`
pub fn enabled_change(event: &StorageEvent) -> Option<bool> {
    if event.area != StorageArea::Sync {
        return None;
    }
    event
        .changes
        .get(KEY_ENABLED)
        .map(|change| enabled_from_value(change.new_value.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StorageChange;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn event(area: StorageArea, key: &str, new_value: Option<Value>) -> StorageEvent {
        let mut changes = BTreeMap::new();
        changes.insert(
            key.to_string(),
            StorageChange {
                old_value: None,
                new_value,
            },
        );
        StorageEvent { area, changes }
    }

    #[test]
    fn test_badge_text() {
        assert_eq!(BadgeState::for_enabled(true).text, "");
        assert_eq!(BadgeState::for_enabled(false).text, "OFF");
        assert_eq!(BadgeState::for_enabled(false).background_color, "#ef4444");
    }

    #[test]
    fn test_enabled_change() {
        assert_eq!(
            enabled_change(&event(StorageArea::Sync, "enabled", Some(json!(false)))),
            Some(false)
        );
        assert_eq!(
            enabled_change(&event(StorageArea::Sync, "enabled", None)),
            Some(true)
        );
        assert_eq!(
            enabled_change(&event(StorageArea::Sync, "theme", Some(json!("dark")))),
            None
        );
        assert_eq!(
            enabled_change(&event(StorageArea::Local, "enabled", Some(json!(false)))),
            None
        );
    }
}
