//! Zigbee Cluster Library vocabulary
//!
//! Cluster identifiers, status codes, attribute data types and the
//! per-request frame options shared by everything that talks ZCL.

pub mod cluster;
pub mod manufacturer;
pub mod options;
pub mod types;

pub use cluster::{Cluster, Direction};
pub use manufacturer::Vendor;
pub use options::{AttributeId, AttributeValue, CommandResponse, ZclOptions};
pub use types::*;
