//! Declarative capabilities and options
//!
//! Exposes are data for the application (UI, discovery); the registry only
//! adds, deduplicates and forwards them. Definition options use the same
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Access flag: value is published in state
pub const ACCESS_STATE: u8 = 0b001;
/// Access flag: value can be set
pub const ACCESS_SET: u8 = 0b010;
/// Access flag: value can be read on request
pub const ACCESS_GET: u8 = 0b100;

/// One exposed capability or option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expose {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Type specific fields (unit, ranges, enum values, features, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Expose {
    #[must_use]
    pub fn new(kind: &str, name: &str, access: u8) -> Self {
        Self {
            kind: kind.to_string(),
            name: Some(name.to_string()),
            property: Some(name.to_string()),
            access: Some(access),
            description: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn numeric(name: &str, access: u8) -> Self {
        Self::new("numeric", name, access)
    }

    #[must_use]
    pub fn binary(name: &str, access: u8, value_on: Value, value_off: Value) -> Self {
        Self::new("binary", name, access)
            .with("value_on", value_on)
            .with("value_off", value_off)
    }

    #[must_use]
    pub fn enumeration(name: &str, access: u8, values: &[&str]) -> Self {
        Self::new("enum", name, access).with("values", json!(values))
    }

    #[must_use]
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Link quality, appended to every definition that lacks it
#[must_use]
pub fn linkquality() -> Expose {
    Expose::numeric("linkquality", ACCESS_STATE)
        .with_description("Link quality (signal strength)")
        .with("unit", json!("lqi"))
        .with("value_min", json!(0))
        .with("value_max", json!(255))
}

/// Option presets converters declare
pub mod options {
    use super::*;

    #[must_use]
    pub fn transition() -> Expose {
        Expose::numeric("transition", ACCESS_SET)
            .with_description("Controls the transition time (in seconds) of on/off, brightness, color temperature (if applicable) and color (if applicable) changes. Defaults to `0` (no transition).")
            .with("value_min", json!(0))
    }

    #[must_use]
    pub fn color_sync() -> Expose {
        Expose::binary("color_sync", ACCESS_SET, json!(true), json!(false))
            .with_description("When enabled colors will be synced, e.g. if the light supports both color x/y and color temperature a conversion from color x/y to color temperature will be done when setting the x/y color (default true).")
    }

    #[must_use]
    pub fn invert_cover() -> Expose {
        Expose::binary("invert_cover", ACCESS_SET, json!(true), json!(false))
            .with_description("Inverts the cover position, false: open=100,close=0, true: open=0,close=100 (default false).")
    }

    #[must_use]
    pub fn cover_position_tilt_disable_report() -> Expose {
        Expose::binary("cover_position_tilt_disable_report", ACCESS_SET, json!(true), json!(false))
            .with_description("Do not publish set cover target position as a normal 'position' value (default false).")
    }

    #[must_use]
    pub fn thermostat_unit() -> Expose {
        Expose::enumeration("thermostat_unit", ACCESS_SET, &["celsius", "fahrenheit"])
            .with_description("Controls the temperature unit of the thermostat (default celsius).")
    }

    #[must_use]
    pub fn identify_timeout() -> Expose {
        Expose::numeric("identify_timeout", ACCESS_SET)
            .with_description("Sets the duration of the identification procedure in seconds (i.e., how long the device would flash).The value ranges from 1 to 30 seconds (default: 3).")
            .with("value_min", json!(1))
            .with("value_max", json!(30))
    }
}
