//! Per-request frame options and attribute payload types

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::Status;

/// Options attached to a single read, write or command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ZclOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_default_response: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_response: Option<bool>,
    /// Response timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_sequence_number: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_bits: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_undiv: Option<bool>,
}

impl ZclOptions {
    #[must_use]
    pub fn manufacturer(code: u16) -> Self {
        Self {
            manufacturer_code: Some(code),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_manufacturer_code(mut self, code: u16) -> Self {
        self.manufacturer_code = Some(code);
        self
    }

    #[must_use]
    pub fn with_disable_default_response(mut self, disable: bool) -> Self {
        self.disable_default_response = Some(disable);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    /// Overlay `other` on top of `self`; fields set in `other` win
    #[must_use]
    pub fn merge(&self, other: &ZclOptions) -> ZclOptions {
        ZclOptions {
            manufacturer_code: other.manufacturer_code.or(self.manufacturer_code),
            disable_default_response: other
                .disable_default_response
                .or(self.disable_default_response),
            disable_response: other.disable_response.or(self.disable_response),
            timeout: other.timeout.or(self.timeout),
            transaction_sequence_number: other
                .transaction_sequence_number
                .or(self.transaction_sequence_number),
            direction: other.direction.or(self.direction),
            reserved_bits: other.reserved_bits.or(self.reserved_bits),
            write_undiv: other.write_undiv.or(self.write_undiv),
        }
    }
}

/// An attribute referenced by ZCL name or by raw id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeId {
    Id(u16),
    Name(String),
}

impl From<&str> for AttributeId {
    fn from(name: &str) -> Self {
        AttributeId::Name(name.to_string())
    }
}

impl From<String> for AttributeId {
    fn from(name: String) -> Self {
        AttributeId::Name(name)
    }
}

impl From<u16> for AttributeId {
    fn from(id: u16) -> Self {
        AttributeId::Id(id)
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeId::Id(id) => write!(f, "{id}"),
            AttributeId::Name(name) => f.write_str(name),
        }
    }
}

/// A value to write; raw attribute ids need an explicit data type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub value: Value,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<u8>,
}

impl AttributeValue {
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            data_type: None,
        }
    }

    #[must_use]
    pub fn typed(value: impl Into<Value>, data_type: u8) -> Self {
        Self {
            value: value.into(),
            data_type: Some(data_type),
        }
    }
}

/// Cluster-specific response to a command
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: u8,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl CommandResponse {
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(status: u8) -> Self {
        Self {
            status,
            payload: Map::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == Status::Success as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_prefers_override() {
        let base = ZclOptions::manufacturer(0x100B).with_timeout(1000);
        let over = ZclOptions {
            timeout: Some(5000),
            disable_default_response: Some(true),
            ..ZclOptions::default()
        };
        let merged = base.merge(&over);
        assert_eq!(merged.manufacturer_code, Some(0x100B));
        assert_eq!(merged.timeout, Some(5000));
        assert_eq!(merged.disable_default_response, Some(true));
    }

    #[test]
    fn test_options_serde_camel_case() {
        let opts: ZclOptions =
            serde_json::from_value(json!({"manufacturerCode": 4447, "disableDefaultResponse": true}))
                .unwrap();
        assert_eq!(opts.manufacturer_code, Some(0x115F));
        assert_eq!(opts.disable_default_response, Some(true));
        assert_eq!(serde_json::to_value(&ZclOptions::default()).unwrap(), json!({}));
    }

    #[test]
    fn test_attribute_id_untagged() {
        let ids: Vec<AttributeId> = serde_json::from_value(json!(["onOff", 16392])).unwrap();
        assert_eq!(ids[0], AttributeId::from("onOff"));
        assert_eq!(ids[1], AttributeId::Id(0x4008));
        assert_eq!(ids[1].to_string(), "16392");
    }

    #[test]
    fn test_command_response_success() {
        assert!(CommandResponse::success().is_success());
        assert!(!CommandResponse::with_status(0x8b).is_success());
    }
}
