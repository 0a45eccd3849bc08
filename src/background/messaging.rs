// Runtime messaging
//
// Request/response channel used by page scripts to ask the background for
// the current settings snapshot.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::settings::Storage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuntimeMessage {
    GetSettings,
}

pub fn parse_message(message: &Value) -> Result<RuntimeMessage> {
    RuntimeMessage::deserialize(message).context("Unrecognized runtime message")
}

/// Answer a runtime message. Unknown messages get no response.
pub async fn handle_message(storage: &Storage, message: &Value) -> Option<Value> {
    let message = match parse_message(message) {
        Ok(message) => message,
        Err(e) => {
            log::debug!("{:#}", e);
            return None;
        }
    };

    match message {
        RuntimeMessage::GetSettings => {
            let settings = storage.settings().await;
            match serde_json::to_value(&settings) {
                Ok(value) => Some(value),
                Err(e) => {
                    log::error!("Failed to serialize settings: {}", e);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemoryStorage;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_settings_returns_full_snapshot() {
        let storage = Storage::new(Arc::new(MemoryStorage::new()));
        storage.set_value("minImageSize", json!(64)).await;

        let response = handle_message(&storage, &json!({ "type": "getSettings" }))
            .await
            .unwrap();

        assert_eq!(response["minImageSize"], json!(64));
        assert_eq!(response["blurValue"], json!(20));
        assert_eq!(response["excludeClasses"], json!(["logo", "icon", "avatar", "emoji"]));
    }

    #[tokio::test]
    async fn test_unknown_message_gets_no_response() {
        let storage = Storage::new(Arc::new(MemoryStorage::new()));
        assert!(handle_message(&storage, &json!({ "type": "ping" })).await.is_none());
        assert!(handle_message(&storage, &json!("getSettings")).await.is_none());
    }
}
