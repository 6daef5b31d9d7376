//! Zigbee device definitions and toZigbee converters
//!
//! The [`DefinitionRegistry`] resolves a joined device to its
//! [`Definition`]; the definition's [`Converter`]s turn requested state into
//! ZCL traffic on an [`Entity`](zigbee_core::Entity).

pub mod catalog;
pub mod converter;
pub mod definition;
pub mod error;
pub mod expose;
pub mod extend;
pub mod fingerprint;
pub mod hooks;
pub mod options;
pub mod registry;
pub mod tz;

#[cfg(test)]
mod testing;

pub use catalog::{load_catalog, parse_catalog, CatalogEntry};
pub use converter::{ConvertOutcome, Converter, Mapped, Meta, SetResult};
pub use definition::{Definition, DefinitionMeta, DefinitionSpec, Exposes, Extend, ModernExtend, WhiteLabel};
pub use error::{ConvertError, RegistryError};
pub use expose::Expose;
pub use fingerprint::{Fingerprint, FingerprintEndpoint};
pub use hooks::{Configure, DeviceEvent, ForgetOnStop, LightConfigure, OnEvent};
pub use options::{DeviceOptions, ThermostatUnit};
pub use registry::DefinitionRegistry;
