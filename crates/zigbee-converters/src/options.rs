//! Per-device configuration
//!
//! Options are configured by the user per device or group and handed to
//! every converter call. Keys nothing here knows about are kept in `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use zigbee_core::HueCorrection;

/// Unit setpoints are entered in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermostatUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// Options of one device or group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceOptions {
    /// Default transition in seconds; an empty string counts as unset
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub transition: Option<f64>,
    pub invert_cover: bool,
    pub cover_position_tilt_disable_report: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_sync: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thermostat_unit: Option<ThermostatUnit>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hue_correction: Vec<HueCorrection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identify_timeout: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceOptions {
    /// Parse options from a JSON object
    #[allow(clippy::missing_errors_doc)]
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Color sync defaults to on
    #[must_use]
    pub fn color_sync(&self) -> bool {
        self.color_sync.unwrap_or(true)
    }

    #[must_use]
    pub fn fahrenheit(&self) -> bool {
        self.thermostat_unit == Some(ThermostatUnit::Fahrenheit)
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid number '{s}'"))),
        Some(other) => Err(serde::de::Error::custom(format!("invalid number {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = DeviceOptions::default();
        assert!(options.color_sync());
        assert!(!options.invert_cover);
        assert!(!options.fahrenheit());
        assert_eq!(options.transition, None);
    }

    #[test]
    fn test_parse_options() {
        let options = DeviceOptions::from_value(json!({
            "transition": "1.5",
            "invert_cover": true,
            "color_sync": false,
            "thermostat_unit": "fahrenheit",
            "hue_correction": [{"in": 0, "out": 10}, {"in": 180, "out": 200}],
            "friendly_name": "kitchen",
        }))
        .unwrap();
        assert_eq!(options.transition, Some(1.5));
        assert!(options.invert_cover);
        assert!(!options.color_sync());
        assert!(options.fahrenheit());
        assert_eq!(options.hue_correction.len(), 2);
        assert_eq!(options.extra.get("friendly_name"), Some(&json!("kitchen")));
    }

    #[test]
    fn test_empty_transition_is_unset() {
        let options = DeviceOptions::from_value(json!({"transition": ""})).unwrap();
        assert_eq!(options.transition, None);
        assert!(DeviceOptions::from_value(json!({"transition": "slow"})).is_err());
    }
}
