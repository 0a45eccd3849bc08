// Extension lifecycle
//
// Install and update handling: seed default settings on first install and
// drop the session whitelist whenever the extension is (re)installed.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::settings::{Settings, Storage};

/// Why the browser fired `onInstalled`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    BrowserUpdate,
    SharedModuleUpdate,
}

impl FromStr for InstallReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "install" => Ok(InstallReason::Install),
            "update" => Ok(InstallReason::Update),
            "chrome_update" | "browser_update" => Ok(InstallReason::BrowserUpdate),
            "shared_module_update" => Ok(InstallReason::SharedModuleUpdate),
            other => Err(anyhow!("Unknown install reason: {}", other)),
        }
    }
}

/// React to an install/update event
pub async fn on_installed(storage: &Storage, reason: &InstallReason, version: &str) {
    match reason {
        InstallReason::Install => {
            log::info!("Extension installed");
            storage.set(Settings::default().to_map()).await;
            storage.clear_temp_whitelist().await;
        }
        InstallReason::Update => {
            log::info!("Extension updated to version {}", version);
            storage.clear_temp_whitelist().await;
        }
        other => log::debug!("Ignoring install event: {:?}", other),
    }
}
