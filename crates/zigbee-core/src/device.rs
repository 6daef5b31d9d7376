//! Zigbee device representation
//!
//! A [`DeviceDescriptor`] is the interview result of a node: Basic cluster
//! attributes plus the simple descriptor of every endpoint. It is the input
//! of fingerprint matching and carries no live state.

use serde::{Deserialize, Serialize};

/// Zigbee device types (network role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
    GreenPower,
    Unknown,
}

/// A Zigbee device as identified during interview
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    /// IEEE address (EUI-64), least significant byte first
    pub ieee_address: [u8; 8],
    /// Model identifier (from Basic cluster)
    pub model_id: Option<String>,
    /// Manufacturer code from the node descriptor
    pub manufacturer_id: Option<u16>,
    /// Manufacturer name (from Basic cluster)
    pub manufacturer_name: Option<String>,
    pub application_version: Option<u8>,
    /// Device type (network role)
    #[serde(rename = "type")]
    pub device_type: Option<DeviceType>,
    pub date_code: Option<String>,
    pub hardware_version: Option<u8>,
    #[serde(rename = "softwareBuildID")]
    pub software_build_id: Option<String>,
    pub stack_version: Option<u8>,
    pub zcl_version: Option<u8>,
    /// Power source as reported by the Basic cluster, e.g. "Battery"
    pub power_source: Option<String>,
    /// Device endpoints
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl DeviceDescriptor {
    /// Create a descriptor with just an address
    #[must_use]
    pub fn new(ieee_address: [u8; 8]) -> Self {
        Self {
            ieee_address,
            model_id: None,
            manufacturer_id: None,
            manufacturer_name: None,
            application_version: None,
            device_type: None,
            date_code: None,
            hardware_version: None,
            software_build_id: None,
            stack_version: None,
            zcl_version: None,
            power_source: None,
            endpoints: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model_id: &str) -> Self {
        self.model_id = Some(model_id.to_string());
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Get IEEE address as `0x`-prefixed hex, most significant byte first
    #[must_use]
    pub fn ieee_address_string(&self) -> String {
        let hex: String = self
            .ieee_address
            .iter()
            .rev() // IEEE addresses are displayed in reverse byte order
            .map(|b| format!("{b:02x}"))
            .collect();
        format!("0x{hex}")
    }

    #[must_use]
    pub fn endpoint(&self, id: u8) -> Option<&Endpoint> {
        self.endpoints.iter().find(|ep| ep.id == id)
    }
}

/// A device endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Endpoint ID (1-240)
    #[serde(rename = "ID")]
    pub id: u8,
    /// Profile ID (e.g., 0x0104 for Home Automation)
    pub profile_id: Option<u16>,
    /// Device ID within the profile
    #[serde(rename = "deviceID")]
    pub device_id: Option<u16>,
    /// Input (server) clusters
    #[serde(default)]
    pub input_clusters: Vec<u16>,
    /// Output (client) clusters
    #[serde(default)]
    pub output_clusters: Vec<u16>,
}

impl Endpoint {
    #[must_use]
    pub fn new(id: u8) -> Self {
        Self {
            id,
            profile_id: None,
            device_id: None,
            input_clusters: Vec::new(),
            output_clusters: Vec::new(),
        }
    }

    /// Check if endpoint has a specific cluster
    #[must_use]
    pub fn has_cluster(&self, cluster_id: u16) -> bool {
        self.input_clusters.contains(&cluster_id) || self.output_clusters.contains(&cluster_id)
    }

    /// Check if the endpoint serves a cluster as input
    #[must_use]
    pub fn supports_input_cluster(&self, cluster_id: u16) -> bool {
        self.input_clusters.contains(&cluster_id)
    }
}
