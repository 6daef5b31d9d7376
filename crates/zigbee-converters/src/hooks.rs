//! Lifecycle hooks a definition can carry
//!
//! `configure` runs once after a device joins; `on_event` sees device
//! lifecycle events. A definition has at most one of each.

use std::fmt;

use async_trait::async_trait;
use zcl_protocol::{Cluster, ZclOptions};
use zigbee_core::{Entity, EntityStore};

use crate::error::ConvertError;

/// Device lifecycle events forwarded to `on_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Start,
    Stop,
    DeviceJoined,
    DeviceInterview,
    DeviceAnnounce,
    DeviceOptionsChanged,
}

#[async_trait]
pub trait Configure: Send + Sync + fmt::Debug {
    /// Prepare the device; `endpoints` are all endpoints of the device
    async fn configure(&self, endpoints: &[Entity]) -> Result<(), ConvertError>;
}

#[async_trait]
pub trait OnEvent: Send + Sync + fmt::Debug {
    async fn on_event(&self, event: DeviceEvent, entity: &Entity, store: &EntityStore) -> Result<(), ConvertError>;
}

/// Reads color capabilities (and optionally the physical color temperature
/// range) of every color endpoint, so converters can clamp requests
#[derive(Debug, Clone, Copy, Default)]
pub struct LightConfigure {
    pub read_color_temp_range: bool,
}

#[async_trait]
impl Configure for LightConfigure {
    async fn configure(&self, endpoints: &[Entity]) -> Result<(), ConvertError> {
        let options = ZclOptions::default();
        for entity in endpoints {
            let Some(endpoint) = entity.as_endpoint() else {
                continue;
            };
            if !endpoint.supports_input_cluster(Cluster::COLOR_CONTROL) {
                continue;
            }
            let mut attributes = vec!["colorCapabilities"];
            if self.read_color_temp_range {
                attributes.extend(["colorTempPhysicalMin", "colorTempPhysicalMax"]);
            }
            // Some firmwares reject these reads; what answers is cached
            let result = entity
                .read_best_effort(Cluster::COLOR_CONTROL, &attributes, &options)
                .await;
            tracing::debug!(
                "Configured color endpoint {} ({} of {} attributes read)",
                entity.id(),
                result.values.len(),
                attributes.len()
            );
        }
        Ok(())
    }
}

/// Forgets the transient per-entity values when the device is stopped
#[derive(Debug, Clone, Copy, Default)]
pub struct ForgetOnStop;

#[async_trait]
impl OnEvent for ForgetOnStop {
    async fn on_event(&self, event: DeviceEvent, entity: &Entity, store: &EntityStore) -> Result<(), ConvertError> {
        if event == DeviceEvent::Stop {
            store.clear_entity(entity.id());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{color_light, MockLink};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_light_configure_caches_range() {
        let link = Arc::new(MockLink::default());
        link.set_read_value("colorCapabilities", json!(0x1f));
        link.set_read_value("colorTempPhysicalMin", json!(153));
        link.fail_read("colorTempPhysicalMax");
        let entity = color_light(&link);

        let hook = LightConfigure { read_color_temp_range: true };
        hook.configure(std::slice::from_ref(&entity)).await.unwrap();

        let endpoint = entity.as_endpoint().unwrap();
        assert_eq!(endpoint.cached_attribute(Cluster::COLOR_CONTROL, "colorTempPhysicalMin"), Some(json!(153)));
        assert_eq!(endpoint.cached_attribute(Cluster::COLOR_CONTROL, "colorTempPhysicalMax"), None);
        assert_eq!(link.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_forget_on_stop() {
        let link = Arc::new(MockLink::default());
        let entity = color_light(&link);
        let store = EntityStore::new();
        store.put(entity.id(), "brightness", json!(20));

        ForgetOnStop.on_event(DeviceEvent::Start, &entity, &store).await.unwrap();
        assert!(store.has(entity.id(), "brightness"));
        ForgetOnStop.on_event(DeviceEvent::Stop, &entity, &store).await.unwrap();
        assert!(!store.has(entity.id(), "brightness"));
    }
}
