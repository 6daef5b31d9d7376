//! Structural device matchers
//!
//! A fingerprint matches when every field it sets equals the device's; unset,
//! zero and empty fields match anything. Endpoint lists and cluster lists compare as sets of
//! equal size.

use regex::Regex;
use serde::{Deserialize, Serialize};
use zigbee_core::{DeviceDescriptor, DeviceType};

use crate::error::RegistryError;

/// Expected simple descriptor of one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintEndpoint {
    #[serde(rename = "ID")]
    pub id: u8,
    #[serde(default, rename = "deviceID", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<u16>,
    #[serde(default, rename = "profileID", skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_clusters: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_clusters: Option<Vec<u16>>,
}

/// A structural matcher for devices sharing a model string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fingerprint {
    #[serde(rename = "modelID", skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(rename = "manufacturerID", skip_serializing_if = "Option::is_none")]
    pub manufacturer_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_version: Option<u8>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<u8>,
    #[serde(rename = "softwareBuildID", skip_serializing_if = "Option::is_none")]
    pub software_build_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zcl_version: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_source: Option<String>,
    /// Regular expression applied to the `0x`-prefixed address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ieee_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<FingerprintEndpoint>>,
    /// Higher wins when several fingerprints match; defaults to 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip)]
    ieee_regex: Option<Regex>,
}

fn same_members<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

/// Values a fingerprint treats the same as an absent field
trait Wildcard {
    fn is_wildcard(&self) -> bool;
}

impl Wildcard for u8 {
    fn is_wildcard(&self) -> bool {
        *self == 0
    }
}

impl Wildcard for u16 {
    fn is_wildcard(&self) -> bool {
        *self == 0
    }
}

impl Wildcard for String {
    fn is_wildcard(&self) -> bool {
        self.is_empty()
    }
}

impl Wildcard for DeviceType {
    fn is_wildcard(&self) -> bool {
        false
    }
}

fn field_matches<T: PartialEq + Wildcard>(expected: Option<&T>, actual: Option<&T>) -> bool {
    expected
        .filter(|e| !e.is_wildcard())
        .map_or(true, |e| actual == Some(e))
}

impl Fingerprint {
    #[must_use]
    pub fn model(model_id: &str) -> Self {
        Self {
            model_id: Some(model_id.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority.unwrap_or(0)
    }

    /// Compile the address pattern, if any
    pub fn compile(&mut self) -> Result<(), RegistryError> {
        if let Some(pattern) = &self.ieee_addr {
            let regex = Regex::new(pattern).map_err(|source| RegistryError::BadRegex {
                pattern: pattern.clone(),
                source,
            })?;
            self.ieee_regex = Some(regex);
        }
        Ok(())
    }

    fn ieee_matches(&self, device: &DeviceDescriptor) -> bool {
        let Some(pattern) = self.ieee_addr.as_ref().filter(|p| !p.is_empty()) else {
            return true;
        };
        let address = device.ieee_address_string();
        match &self.ieee_regex {
            Some(regex) => regex.is_match(&address),
            None => Regex::new(pattern).is_ok_and(|regex| regex.is_match(&address)),
        }
    }

    /// Check the device against every field this fingerprint sets
    #[must_use]
    pub fn matches(&self, device: &DeviceDescriptor) -> bool {
        let fields = field_matches(self.application_version.as_ref(), device.application_version.as_ref())
            && field_matches(self.manufacturer_id.as_ref(), device.manufacturer_id.as_ref())
            && field_matches(self.device_type.as_ref(), device.device_type.as_ref())
            && field_matches(self.date_code.as_ref(), device.date_code.as_ref())
            && field_matches(self.hardware_version.as_ref(), device.hardware_version.as_ref())
            && field_matches(self.manufacturer_name.as_ref(), device.manufacturer_name.as_ref())
            && field_matches(self.model_id.as_ref(), device.model_id.as_ref())
            && field_matches(self.power_source.as_ref(), device.power_source.as_ref())
            && field_matches(self.software_build_id.as_ref(), device.software_build_id.as_ref())
            && field_matches(self.stack_version.as_ref(), device.stack_version.as_ref())
            && field_matches(self.zcl_version.as_ref(), device.zcl_version.as_ref())
            && self.ieee_matches(device);
        if !fields {
            return false;
        }

        let Some(endpoints) = &self.endpoints else {
            return true;
        };
        let device_ids: Vec<u8> = device.endpoints.iter().map(|e| e.id).collect();
        let expected_ids: Vec<u8> = endpoints.iter().map(|e| e.id).collect();
        if !same_members(&device_ids, &expected_ids) {
            return false;
        }

        endpoints.iter().all(|expected| {
            let Some(actual) = device.endpoint(expected.id) else {
                return false;
            };
            field_matches(expected.device_id.as_ref(), actual.device_id.as_ref())
                && field_matches(expected.profile_id.as_ref(), actual.profile_id.as_ref())
                && expected
                    .input_clusters
                    .as_ref()
                    .map_or(true, |clusters| same_members(&actual.input_clusters, clusters))
                && expected
                    .output_clusters
                    .as_ref()
                    .map_or(true, |clusters| same_members(&actual.output_clusters, clusters))
        })
    }
}
