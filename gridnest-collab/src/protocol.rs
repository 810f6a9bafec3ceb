//! JSON wire protocol between the editing clients and the config server.
//!
//! ```text
//!  client ── PATCH /_liveedit/config        {surfaceId, propName, newValue} ──► server
//!  client ── PATCH /_liveedit/config-batch  {surfaceId, updates}            ──► server
//!  client ── POST  /_liveedit/patch         {action:"reset-config", config} ──► server
//!  client ◄── 200 {success:true} | 4xx/5xx {error} ──────────────────────────── server
//!
//!  every client ◄── ws text {type:"custom", event:"config-update", data:{config}} ── server
//! ```

use gridnest_core::ConfigDocument;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const CONFIG_PATH: &str = "/_liveedit/config";
pub const CONFIG_BATCH_PATH: &str = "/_liveedit/config-batch";
pub const RESET_PATH: &str = "/_liveedit/patch";
pub const DOCUMENT_PATH: &str = "/.liveedit.config.json";
pub const WS_PATH: &str = "/_liveedit/ws";

pub const RESET_ACTION: &str = "reset-config";
pub const MESSAGE_TYPE: &str = "custom";
pub const CONFIG_UPDATE_EVENT: &str = "config-update";

/// Set one prop of one surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPropRequest {
    #[serde(alias = "leId")]
    pub surface_id: String,
    #[serde(alias = "prop")]
    pub prop_name: String,
    #[serde(default)]
    pub new_value: Value,
}

/// Set several props of one surface in a single write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchBatchRequest {
    #[serde(alias = "leId")]
    pub surface_id: String,
    pub updates: Map<String, Value>,
}

/// Whole-document replacement. Only [`RESET_ACTION`] is understood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResetRequest {
    pub action: String,
    #[serde(default)]
    pub config: Value,
}

impl ResetRequest {
    pub fn reset_config(config: &ConfigDocument) -> Result<Self, ProtocolError> {
        Ok(Self {
            action: RESET_ACTION.to_string(),
            config: serde_json::to_value(config)
                .map_err(|e| ProtocolError::Serialization(e.to_string()))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastData {
    pub config: ConfigDocument,
}

/// Push message carrying the full document after every committed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: String,
    pub data: BroadcastData,
}

impl BroadcastMessage {
    pub fn config_update(config: ConfigDocument) -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            event: CONFIG_UPDATE_EVENT.to_string(),
            data: BroadcastData { config },
        }
    }

    /// Serialize to the text frame payload.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// The carried document, if this is a config update.
    pub fn into_config(self) -> Result<ConfigDocument, ProtocolError> {
        if self.kind != MESSAGE_TYPE || self.event != CONFIG_UPDATE_EVENT {
            return Err(ProtocolError::UnexpectedEvent(format!("{}/{}", self.kind, self.event)));
        }
        Ok(self.data.config)
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    Serialization(String),
    Deserialization(String),
    UnexpectedEvent(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Serialization(e) => write!(f, "Serialization error: {e}"),
            Self::Deserialization(e) => write!(f, "Deserialization error: {e}"),
            Self::UnexpectedEvent(e) => write!(f, "Unexpected event: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[cfg(test)]
mod tests {
    use super::*;
    use gridnest_core::ComponentConfig;
    use serde_json::json;

    fn sample_doc() -> ConfigDocument {
        let props = json!({"cols": 4}).as_object().cloned().unwrap();
        ConfigDocument::new("1.0").with_component("main-grid", ComponentConfig::new("Grid", props))
    }

    #[test]
    fn test_patch_prop_field_names() {
        let req: PatchPropRequest =
            serde_json::from_value(json!({"surfaceId": "g", "propName": "cols", "newValue": 3}))
                .unwrap();
        assert_eq!(req.surface_id, "g");
        assert_eq!(req.prop_name, "cols");
        assert_eq!(req.new_value, json!(3));
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"surfaceId": "g", "propName": "cols", "newValue": 3})
        );
    }

    #[test]
    fn test_legacy_aliases_accepted() {
        let req: PatchPropRequest =
            serde_json::from_value(json!({"leId": "g", "prop": "gap", "newValue": "4"})).unwrap();
        assert_eq!(req.surface_id, "g");
        assert_eq!(req.prop_name, "gap");

        let batch: PatchBatchRequest =
            serde_json::from_value(json!({"leId": "g", "updates": {"padding": 4}})).unwrap();
        assert_eq!(batch.updates.get("padding"), Some(&json!(4)));
    }

    #[test]
    fn test_broadcast_wire_shape() {
        let msg = BroadcastMessage::config_update(sample_doc());
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "custom");
        assert_eq!(value["event"], "config-update");
        assert_eq!(value["data"]["config"]["components"]["main-grid"]["props"]["cols"], 4);
    }

    #[test]
    fn test_broadcast_decode_and_unwrap() {
        let text = BroadcastMessage::config_update(sample_doc()).encode().unwrap();
        let config = BroadcastMessage::decode(&text).unwrap().into_config().unwrap();
        assert_eq!(config, sample_doc());
    }

    #[test]
    fn test_foreign_event_rejected() {
        let mut msg = BroadcastMessage::config_update(sample_doc());
        msg.event = "full-reload".into();
        assert!(matches!(msg.into_config(), Err(ProtocolError::UnexpectedEvent(_))));
        assert!(matches!(
            BroadcastMessage::decode("{not json"),
            Err(ProtocolError::Deserialization(_))
        ));
    }

    #[test]
    fn test_reset_request_carries_document() {
        let req = ResetRequest::reset_config(&sample_doc()).unwrap();
        assert_eq!(req.action, RESET_ACTION);
        assert_eq!(req.config["schema"], "1.0");
    }
}
