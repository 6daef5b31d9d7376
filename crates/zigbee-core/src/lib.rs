//! Zigbee abstraction layer
//!
//! Device descriptors, entity handles over an injected ZCL link, the
//! per-entity store with scene snapshots, and the unit and color helpers
//! converters are built from.

pub mod color;
pub mod device;
pub mod entity;
pub mod error;
pub mod persistence;
pub mod store;
pub mod units;

pub use color::{Color, ColorHsv, ColorMode, ColorRgb, ColorTempRange, ColorXy, Gamut, HueCorrection};
pub use device::{DeviceDescriptor, DeviceType, Endpoint};
pub use entity::{BestEffortRead, EndpointEntity, Entity, EntityId, GroupEntity, ZclLink};
pub use error::{ColorError, ValueError};
pub use store::{EntityStore, SceneRecord, SceneSnapshot};
