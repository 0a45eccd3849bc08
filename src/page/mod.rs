// Page Module - Per-page content script
//
// Handles:
// - Document abstraction and the in-memory tree
// - Image scanning, mutation observation and load re-checks
// - Settings change reactions
// - Alt+B whitelist shortcut and on-page notifications

pub mod dom;
pub mod toast;
pub mod tree;
pub mod watcher;

use std::time::Duration;

pub use dom::{Document, ReadyState};
pub use tree::{DomTree, NodeId};
pub use watcher::{PageEvent, PageWatcher};

/// Class marking a blurred image (styled by the extension stylesheet)
pub const BLUR_CLASS: &str = "hoverblurr-blur";

/// Root style variable carrying the blur radius
pub const BLUR_VARIABLE: &str = "--hoverblurr-blur-amount";

pub const NOTIFICATION_CLASS: &str = "hoverblurr-notification";
pub const NOTIFICATION_SHOW_CLASS: &str = "hoverblurr-notification-show";

/// A pressed key as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub meta: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }
}

/// Modifier + key combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub key: String,
    pub alt: bool,
}

impl Shortcut {
    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.key == self.key && (!self.alt || event.alt)
    }
}

/// Page-side constants: marker names, notification timings and the
/// whitelist shortcut
#[derive(Debug, Clone)]
pub struct PageConfig {
    pub blur_class: String,
    pub blur_variable: String,
    pub notification_class: String,
    pub notification_show_class: String,
    /// Delay before the fade-in class is added
    pub notification_show_delay: Duration,
    /// Time from insertion until the fade-out starts
    pub notification_display: Duration,
    /// Fade-out length before the banner is removed
    pub notification_fade: Duration,
    pub toggle_shortcut: Shortcut,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            blur_class: BLUR_CLASS.to_string(),
            blur_variable: BLUR_VARIABLE.to_string(),
            notification_class: NOTIFICATION_CLASS.to_string(),
            notification_show_class: NOTIFICATION_SHOW_CLASS.to_string(),
            notification_show_delay: Duration::from_millis(10),
            notification_display: Duration::from_millis(2000),
            notification_fade: Duration::from_millis(300),
            toggle_shortcut: Shortcut {
                key: "b".to_string(),
                alt: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shortcut_is_alt_b() {
        let shortcut = PageConfig::default().toggle_shortcut;
        assert!(shortcut.matches(&KeyEvent::new("b").with_alt()));
        assert!(!shortcut.matches(&KeyEvent::new("b")));
        assert!(!shortcut.matches(&KeyEvent::new("B").with_alt()));
        assert!(!shortcut.matches(&KeyEvent::new("n").with_alt()));
    }
}
