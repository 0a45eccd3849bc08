// Keyboard commands
//
// Global shortcuts delivered by the browser. Both commands act on the
// active tab's hostname and report the outcome as a system notification.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::notifications::{notify_temp_whitelist_toggled, notify_whitelist_toggled, Notifier};
use crate::settings::storage::parse_host_list;
use crate::settings::{whitelist, Storage, KEY_WHITELIST};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Toggle the active site in the permanent whitelist
    ToggleBlur,
    /// Toggle the active site in the session whitelist
    ToggleTempWhitelist,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::ToggleBlur => "toggle-blur",
            Command::ToggleTempWhitelist => "toggle-temp-whitelist",
        }
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "toggle-blur" => Ok(Command::ToggleBlur),
            "toggle-temp-whitelist" => Ok(Command::ToggleTempWhitelist),
            other => Err(anyhow!("Unknown command: {}", other)),
        }
    }
}

/// Access to the focused tab of the current window
#[async_trait]
pub trait ActiveTab: Send + Sync {
    /// URL of the active tab, if there is one and it is readable
    async fn active_tab_url(&self) -> Option<String>;
}

/// Active tab with a fixed URL, for headless hosts and tests
#[derive(Debug, Clone, Default)]
pub struct FixedTab {
    pub url: Option<String>,
}

impl FixedTab {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }
}

#[async_trait]
impl ActiveTab for FixedTab {
    async fn active_tab_url(&self) -> Option<String> {
        self.url.clone()
    }
}

/// Run a command against the active tab.
///
/// Returns the hostname's new membership, or `None` when the tab has no
/// usable URL or the store failed. Failures are logged here and leave both
/// the store and the notifications untouched.
pub async fn handle_command(
    command: Command,
    storage: &Storage,
    tabs: &dyn ActiveTab,
    notifier: &dyn Notifier,
) -> Option<bool> {
    let url = tabs.active_tab_url().await?;
    let Some(hostname) = whitelist::host_from_url(&url) else {
        log::debug!("Ignoring {}: no hostname in active tab URL", command.as_str());
        return None;
    };

    let result = match command {
        Command::ToggleBlur => toggle_whitelist(storage, &hostname).await,
        Command::ToggleTempWhitelist => toggle_temp_whitelist(storage, &hostname).await,
    };

    let whitelisted = match result {
        Ok(whitelisted) => whitelisted,
        Err(e) => {
            log::error!("Command {} failed for '{}': {:#}", command.as_str(), hostname, e);
            return None;
        }
    };

    match command {
        Command::ToggleBlur => notify_whitelist_toggled(notifier, &hostname, whitelisted),
        Command::ToggleTempWhitelist => {
            notify_temp_whitelist_toggled(notifier, &hostname, whitelisted)
        }
    }

    Some(whitelisted)
}

/// Flip `hostname` in the permanent whitelist; returns the new membership.
///
/// Nothing is written when the current list cannot be read.
pub async fn toggle_whitelist(storage: &Storage, hostname: &str) -> Result<bool> {
    let stored = storage
        .try_get_value(KEY_WHITELIST)
        .await
        .context("Toggling the whitelist")?;
    let mut list = parse_host_list(stored.as_ref());
    let whitelisted = whitelist::toggle(&mut list, hostname);
    storage
        .try_set_value(KEY_WHITELIST, Value::from(list))
        .await
        .context("Toggling the whitelist")?;

    log::info!(
        "{} '{}' {} the whitelist",
        if whitelisted { "Added" } else { "Removed" },
        hostname,
        if whitelisted { "to" } else { "from" }
    );
    Ok(whitelisted)
}

/// Flip `hostname` in the session whitelist; returns the new membership
pub async fn toggle_temp_whitelist(storage: &Storage, hostname: &str) -> Result<bool> {
    let mut list = storage
        .try_temp_whitelist()
        .await
        .context("Toggling the temporary whitelist")?;
    let whitelisted = whitelist::toggle(&mut list, hostname);
    storage
        .try_set_temp_whitelist(list)
        .await
        .context("Toggling the temporary whitelist")?;

    log::info!(
        "{} '{}' {} the temporary whitelist",
        if whitelisted { "Added" } else { "Removed" },
        hostname,
        if whitelisted { "to" } else { "from" }
    );
    Ok(whitelisted)
}
