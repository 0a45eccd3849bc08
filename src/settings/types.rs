// Settings Types
//
// The typed configuration record stored in the synchronized area, plus the
// key names and defaults shared by every context of the extension.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::whitelist;

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_BLUR_VALUE: &str = "blurValue";
pub const KEY_MIN_IMAGE_SIZE: &str = "minImageSize";
pub const KEY_WHITELIST: &str = "whitelist";
pub const KEY_EXCLUDE_CLASSES: &str = "excludeClasses";
pub const KEY_THEME: &str = "theme";

/// Session-scoped key in the local area
pub const KEY_TEMP_WHITELIST: &str = "tempWhitelist";

/// Every key owned by `Settings`, in storage order
pub const SETTINGS_KEYS: [&str; 6] = [
    KEY_ENABLED,
    KEY_BLUR_VALUE,
    KEY_MIN_IMAGE_SIZE,
    KEY_WHITELIST,
    KEY_EXCLUDE_CLASSES,
    KEY_THEME,
];

/// Upper bound of the blur intensity slider
pub const MAX_BLUR_PERCENT: u8 = 100;

/// Blur radius in pixels at 100% intensity
pub const MAX_BLUR_RADIUS_PX: f64 = 50.0;

/// Popup colour scheme preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Auto => "auto",
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Collapse `Auto` into a concrete scheme using the system preference
    pub fn resolve(&self, prefers_dark: bool) -> Theme {
        match self {
            Theme::Auto if prefers_dark => Theme::Dark,
            Theme::Auto => Theme::Light,
            other => *other,
        }
    }

    /// Theme selected by the popup's toggle button
    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Auto | Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Persistent, synchronized extension settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    /// Blur intensity in percent (0-100)
    pub blur_value: u8,
    /// Minimum displayed width and height in pixels; 0 disables the check
    pub min_image_size: u32,
    pub whitelist: Vec<String>,
    /// Case-insensitive substrings matched against image class tokens
    pub exclude_classes: Vec<String>,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            blur_value: 20,
            min_image_size: 40,
            whitelist: Vec::new(),
            exclude_classes: ["logo", "icon", "avatar", "emoji"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            theme: Theme::Auto,
        }
    }
}

impl Settings {
    /// Default values keyed by their storage names
    pub fn default_map() -> Map<String, Value> {
        Settings::default().to_map()
    }

    /// Serialize into a storage map
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Build settings from a (possibly partial) storage map.
    ///
    /// Missing keys keep their defaults; a malformed value is logged and
    /// skipped without affecting the other keys.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut settings = Settings::default();
        for (key, value) in map {
            settings.apply_value(key, value.clone());
        }
        settings
    }

    /// Overwrite a single key. Returns false for unknown keys and values
    /// that fail validation.
    pub fn apply_value(&mut self, key: &str, value: Value) -> bool {
        let result = match key {
            KEY_ENABLED => serde_json::from_value::<bool>(value).map(|v| self.enabled = v),
            KEY_BLUR_VALUE => serde_json::from_value::<u64>(value)
                .map(|v| self.blur_value = v.min(MAX_BLUR_PERCENT as u64) as u8),
            KEY_MIN_IMAGE_SIZE => {
                serde_json::from_value::<u32>(value).map(|v| self.min_image_size = v)
            }
            KEY_WHITELIST => serde_json::from_value::<Vec<String>>(value)
                .map(|v| self.whitelist = whitelist::dedup(v)),
            KEY_EXCLUDE_CLASSES => serde_json::from_value::<Vec<String>>(value)
                .map(|v| self.exclude_classes = whitelist::dedup(v)),
            KEY_THEME => serde_json::from_value::<Theme>(value).map(|v| self.theme = v),
            _ => return false,
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Ignoring malformed value for setting '{}': {}", key, e);
                false
            }
        }
    }

    /// Reset a single key to its default (used when a key is removed)
    pub fn reset_value(&mut self, key: &str) {
        let defaults = Settings::default();
        match key {
            KEY_ENABLED => self.enabled = defaults.enabled,
            KEY_BLUR_VALUE => self.blur_value = defaults.blur_value,
            KEY_MIN_IMAGE_SIZE => self.min_image_size = defaults.min_image_size,
            KEY_WHITELIST => self.whitelist = defaults.whitelist,
            KEY_EXCLUDE_CLASSES => self.exclude_classes = defaults.exclude_classes,
            KEY_THEME => self.theme = defaults.theme,
            _ => {}
        }
    }

    /// Blur radius in pixels for the configured intensity
    pub fn blur_radius_px(&self) -> u32 {
        blur_radius_px(self.blur_value)
    }

    pub fn is_whitelisted(&self, hostname: &str) -> bool {
        whitelist::contains(&self.whitelist, hostname)
    }
}

/// Convert an intensity percentage into a pixel radius (1% = 0.5px)
pub fn blur_radius_px(percent: u8) -> u32 {
    let percent = percent.min(MAX_BLUR_PERCENT) as f64;
    (percent / 100.0 * MAX_BLUR_RADIUS_PX).round() as u32
}
