// Popup Controller
//
// Settings popup logic: reads the current configuration for display, writes
// single settings back as the user edits them, and manages the whitelist
// for the active site and the whitelist list view.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::background::commands::ActiveTab;
use crate::settings::storage::parse_host_list;
use crate::settings::{
    blur_radius_px, whitelist, Storage, Theme, KEY_BLUR_VALUE, KEY_ENABLED, KEY_MIN_IMAGE_SIZE,
    KEY_THEME, KEY_WHITELIST, MAX_BLUR_PERCENT,
};

/// Shown when the active tab has no readable hostname
pub const UNKNOWN_SITE_LABEL: &str = "Unable to detect";

/// Everything the popup displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupState {
    pub enabled: bool,
    pub blur_value: u8,
    pub blur_value_display: String,
    pub min_image_size: u32,
    pub min_image_size_display: String,
    pub theme: Theme,
    pub current_site: Option<String>,
    pub current_site_whitelisted: bool,
}

impl PopupState {
    pub fn current_site_label(&self) -> &str {
        self.current_site.as_deref().unwrap_or(UNKNOWN_SITE_LABEL)
    }

    pub fn whitelist_button_label(&self) -> &'static str {
        if self.current_site_whitelisted {
            "Remove from Whitelist"
        } else {
            "Whitelist Site"
        }
    }
}

pub fn percent_display(value: u8) -> String {
    format!("{}%", value)
}

pub fn pixels_display(value: u32) -> String {
    format!("{}px", value)
}

pub struct PopupController {
    storage: Storage,
    hostname: Option<String>,
}

impl PopupController {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            hostname: None,
        }
    }

    /// Resolve the active site and read the settings to display
    pub async fn load(&mut self, tabs: &dyn ActiveTab) -> PopupState {
        self.hostname = match tabs.active_tab_url().await {
            Some(url) => whitelist::host_from_url(&url),
            None => None,
        };
        if self.hostname.is_none() {
            log::debug!("Popup opened without a detectable site");
        }

        self.state().await
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub async fn state(&self) -> PopupState {
        let settings = self.storage.settings().await;
        let current_site_whitelisted = self
            .hostname
            .as_deref()
            .map(|host| settings.is_whitelisted(host))
            .unwrap_or(false);

        PopupState {
            enabled: settings.enabled,
            blur_value: settings.blur_value,
            blur_value_display: percent_display(settings.blur_value),
            min_image_size: settings.min_image_size,
            min_image_size_display: pixels_display(settings.min_image_size),
            theme: settings.theme,
            current_site: self.hostname.clone(),
            current_site_whitelisted,
        }
    }

    // ==================== Settings ====================

    pub async fn set_enabled(&self, enabled: bool) {
        self.storage.set_value(KEY_ENABLED, Value::from(enabled)).await;
    }

    /// Store the blur intensity; returns the display label
    pub async fn set_blur_value(&self, value: u8) -> String {
        let value = value.min(MAX_BLUR_PERCENT);
        self.storage.set_value(KEY_BLUR_VALUE, Value::from(value)).await;
        log::debug!("Blur set to {}% ({}px)", value, blur_radius_px(value));
        percent_display(value)
    }

    /// Store the minimum image size; returns the display label
    pub async fn set_min_image_size(&self, value: u32) -> String {
        self.storage
            .set_value(KEY_MIN_IMAGE_SIZE, Value::from(value))
            .await;
        pixels_display(value)
    }

    /// Cycle auto/light → dark → light and persist the choice
    pub async fn toggle_theme(&self) -> Theme {
        let current = self.storage.settings().await.theme;
        let next = current.toggled();
        self.storage
            .set_value(KEY_THEME, Value::from(next.as_str()))
            .await;
        next
    }

    // ==================== Whitelist ====================

    pub async fn whitelist(&self) -> Vec<String> {
        parse_host_list(self.storage.get_value(KEY_WHITELIST).await.as_ref())
    }

    /// Flip the active site's membership. `None` without an active site or
    /// when the store fails.
    pub async fn toggle_current_site(&self) -> Option<bool> {
        let hostname = self.hostname.as_deref()?;
        match self
            .edit_whitelist(|list| (whitelist::toggle(list, hostname), true))
            .await
        {
            Ok(whitelisted) => Some(whitelisted),
            Err(e) => {
                log::error!("Failed to toggle '{}': {:#}", hostname, e);
                None
            }
        }
    }

    /// Remove one entry from the list view.
    ///
    /// Returns true when the active site was removed, so the whitelist
    /// button needs resetting.
    pub async fn remove_site(&self, site: &str) -> bool {
        match self
            .edit_whitelist(|list| {
                let removed = whitelist::remove(list, site);
                (removed, removed)
            })
            .await
        {
            Ok(removed) => removed && self.hostname.as_deref() == Some(site),
            Err(e) => {
                log::error!("Failed to remove '{}' from the whitelist: {:#}", site, e);
                false
            }
        }
    }

    /// Read the stored list, apply `edit` and write it back when `edit`
    /// reports a change. Nothing is written if the read fails.
    async fn edit_whitelist<F>(&self, edit: F) -> Result<bool>
    where
        F: FnOnce(&mut Vec<String>) -> (bool, bool),
    {
        let stored = self.storage.try_get_value(KEY_WHITELIST).await?;
        let mut list = parse_host_list(stored.as_ref());
        let (outcome, changed) = edit(&mut list);
        if changed {
            self.storage
                .try_set_value(KEY_WHITELIST, Value::from(list))
                .await?;
        }
        Ok(outcome)
    }
}
