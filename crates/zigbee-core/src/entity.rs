//! Entity handles
//!
//! An [`Entity`] is the target of a conversion: either one endpoint of a
//! device or a group of endpoints addressed together. All ZCL traffic goes
//! through an injected [`ZclLink`], which owns addressing and retries.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zcl_protocol::{AttributeId, AttributeValue, Cluster, CommandResponse, ZclError, ZclOptions};

use crate::device::DeviceDescriptor;

/// Stable identity of an entity, used as the key of every per-entity cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityId {
    Endpoint { ieee: [u8; 8], endpoint: u8 },
    Group(u16),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Endpoint { ieee, endpoint } => {
                write!(f, "0x")?;
                for byte in ieee.iter().rev() {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "/{endpoint}")
            }
            EntityId::Group(id) => write!(f, "group {id}"),
        }
    }
}

/// Outbound ZCL operations, implemented by the radio stack
#[async_trait]
pub trait ZclLink: Send + Sync {
    /// Read attributes; returns the values the device answered with, keyed by attribute
    async fn read(
        &self,
        target: &EntityId,
        cluster: Cluster,
        attributes: &[AttributeId],
        options: &ZclOptions,
    ) -> Result<Map<String, Value>, ZclError>;

    async fn write(
        &self,
        target: &EntityId,
        cluster: Cluster,
        attributes: &[(AttributeId, AttributeValue)],
        options: &ZclOptions,
    ) -> Result<(), ZclError>;

    /// Send a cluster command; group targets answer with a synthetic success
    async fn command(
        &self,
        target: &EntityId,
        cluster: Cluster,
        command: &str,
        payload: &Value,
        options: &ZclOptions,
    ) -> Result<CommandResponse, ZclError>;

    async fn command_response(
        &self,
        target: &EntityId,
        cluster: Cluster,
        command: &str,
        payload: &Value,
        options: &ZclOptions,
    ) -> Result<(), ZclError>;
}

/// Partial result of a batch of optional attribute reads
#[derive(Debug, Default)]
pub struct BestEffortRead {
    pub values: Map<String, Value>,
    pub failed: Vec<(AttributeId, ZclError)>,
}

impl BestEffortRead {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One endpoint of a device
pub struct EndpointEntity {
    device: Arc<DeviceDescriptor>,
    endpoint_id: u8,
    link: Arc<dyn ZclLink>,
    attributes: DashMap<(u16, String), Value>,
}

impl EndpointEntity {
    #[must_use]
    pub fn new(device: Arc<DeviceDescriptor>, endpoint_id: u8, link: Arc<dyn ZclLink>) -> Self {
        Self {
            device,
            endpoint_id,
            link,
            attributes: DashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> EntityId {
        EntityId::Endpoint {
            ieee: self.device.ieee_address,
            endpoint: self.endpoint_id,
        }
    }

    #[must_use]
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    #[must_use]
    pub fn endpoint_id(&self) -> u8 {
        self.endpoint_id
    }

    #[must_use]
    pub fn ieee_address(&self) -> String {
        self.device.ieee_address_string()
    }

    /// Check whether the endpoint serves `cluster` as an input cluster
    #[must_use]
    pub fn supports_input_cluster(&self, cluster: Cluster) -> bool {
        self.device
            .endpoint(self.endpoint_id)
            .is_some_and(|ep| ep.supports_input_cluster(cluster.id))
    }

    /// Last known value of an attribute, from reads or reports
    #[must_use]
    pub fn cached_attribute(&self, cluster: Cluster, attribute: &str) -> Option<Value> {
        self.attributes
            .get(&(cluster.id, attribute.to_string()))
            .map(|v| v.value().clone())
    }

    /// Record an attribute value, e.g. from an incoming report
    pub fn save_cluster_attribute(&self, cluster: Cluster, attribute: &str, value: Value) {
        self.attributes.insert((cluster.id, attribute.to_string()), value);
    }
}

impl fmt::Debug for EndpointEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointEntity").field("id", &self.id()).finish()
    }
}

/// A Zigbee group and the endpoints known to be its members
pub struct GroupEntity {
    group_id: u16,
    members: Vec<Arc<EndpointEntity>>,
    link: Arc<dyn ZclLink>,
}

impl GroupEntity {
    #[must_use]
    pub fn new(group_id: u16, members: Vec<Arc<EndpointEntity>>, link: Arc<dyn ZclLink>) -> Self {
        Self { group_id, members, link }
    }

    #[must_use]
    pub fn group_id(&self) -> u16 {
        self.group_id
    }
}

impl fmt::Debug for GroupEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupEntity")
            .field("group_id", &self.group_id)
            .field("members", &self.members)
            .finish()
    }
}

/// Target of a conversion
#[derive(Debug, Clone)]
pub enum Entity {
    Endpoint(Arc<EndpointEntity>),
    Group(Arc<GroupEntity>),
}

impl Entity {
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Endpoint(ep) => ep.id(),
            Entity::Group(group) => EntityId::Group(group.group_id),
        }
    }

    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Entity::Group(_))
    }

    #[must_use]
    pub fn as_endpoint(&self) -> Option<&Arc<EndpointEntity>> {
        match self {
            Entity::Endpoint(ep) => Some(ep),
            Entity::Group(_) => None,
        }
    }

    /// Group members; empty for an endpoint
    #[must_use]
    pub fn members(&self) -> &[Arc<EndpointEntity>] {
        match self {
            Entity::Endpoint(_) => &[],
            Entity::Group(group) => &group.members,
        }
    }

    /// The endpoint itself, or the first member of a group
    #[must_use]
    pub fn endpoint_or_first_member(&self) -> Option<&Arc<EndpointEntity>> {
        match self {
            Entity::Endpoint(ep) => Some(ep),
            Entity::Group(group) => group.members.first(),
        }
    }

    /// Manufacturer codes of the device (or of every group member)
    #[must_use]
    pub fn manufacturer_ids(&self) -> Vec<u16> {
        match self {
            Entity::Endpoint(ep) => ep.device.manufacturer_id.into_iter().collect(),
            Entity::Group(group) => group
                .members
                .iter()
                .filter_map(|m| m.device.manufacturer_id)
                .collect(),
        }
    }

    fn link(&self) -> &Arc<dyn ZclLink> {
        match self {
            Entity::Endpoint(ep) => &ep.link,
            Entity::Group(group) => &group.link,
        }
    }

    pub async fn read(
        &self,
        cluster: Cluster,
        attributes: &[AttributeId],
        options: &ZclOptions,
    ) -> Result<Map<String, Value>, ZclError> {
        let id = self.id();
        tracing::debug!("ZCL read {} {:?} from {}", cluster, attributes, id);
        let values = self.link().read(&id, cluster, attributes, options).await?;
        if let Entity::Endpoint(ep) = self {
            for (name, value) in &values {
                ep.save_cluster_attribute(cluster, name, value.clone());
            }
        }
        Ok(values)
    }

    /// Read attributes given by name
    pub async fn read_names(
        &self,
        cluster: Cluster,
        attributes: &[&str],
        options: &ZclOptions,
    ) -> Result<Map<String, Value>, ZclError> {
        let ids: Vec<AttributeId> = attributes.iter().map(|a| AttributeId::from(*a)).collect();
        self.read(cluster, &ids, options).await
    }

    pub async fn write(
        &self,
        cluster: Cluster,
        attributes: &[(AttributeId, AttributeValue)],
        options: &ZclOptions,
    ) -> Result<(), ZclError> {
        let id = self.id();
        tracing::debug!("ZCL write {} {:?} to {}", cluster, attributes, id);
        self.link().write(&id, cluster, attributes, options).await
    }

    /// Write one attribute by name
    pub async fn write_one(
        &self,
        cluster: Cluster,
        attribute: &str,
        value: impl Into<Value> + Send,
        options: &ZclOptions,
    ) -> Result<(), ZclError> {
        let attributes = [(AttributeId::from(attribute), AttributeValue::new(value))];
        self.write(cluster, &attributes, options).await
    }

    pub async fn command(
        &self,
        cluster: Cluster,
        command: &str,
        payload: Value,
        options: &ZclOptions,
    ) -> Result<CommandResponse, ZclError> {
        let id = self.id();
        tracing::debug!("ZCL command {}.{} {} to {}", cluster, command, payload, id);
        self.link().command(&id, cluster, command, &payload, options).await
    }

    pub async fn command_response(
        &self,
        cluster: Cluster,
        command: &str,
        payload: Value,
        options: &ZclOptions,
    ) -> Result<(), ZclError> {
        let id = self.id();
        tracing::debug!("ZCL command response {}.{} {} to {}", cluster, command, payload, id);
        self.link().command_response(&id, cluster, command, &payload, options).await
    }

    /// Read each attribute on its own, collecting what answered and what failed
    pub async fn read_best_effort(
        &self,
        cluster: Cluster,
        attributes: &[&str],
        options: &ZclOptions,
    ) -> BestEffortRead {
        let mut result = BestEffortRead::default();
        for attribute in attributes {
            let id = AttributeId::from(*attribute);
            match self.read(cluster, std::slice::from_ref(&id), options).await {
                Ok(values) => result.values.extend(values),
                Err(e) => {
                    tracing::debug!("Optional read of {}.{} failed on {}: {}", cluster, attribute, self.id(), e);
                    result.failed.push((id, e));
                }
            }
        }
        result
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording link used by unit tests across the crate

    use super::*;
    use std::sync::Mutex;

    /// One recorded outbound operation
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Read { target: EntityId, cluster: u16, attributes: Vec<AttributeId>, options: ZclOptions },
        Write { target: EntityId, cluster: u16, attributes: Vec<(AttributeId, AttributeValue)>, options: ZclOptions },
        Command { target: EntityId, cluster: u16, command: String, payload: Value, options: ZclOptions },
        CommandResponse { target: EntityId, cluster: u16, command: String, payload: Value, options: ZclOptions },
    }

    #[derive(Default)]
    pub struct MockLink {
        pub calls: Mutex<Vec<Call>>,
        pub read_values: Mutex<Map<String, Value>>,
        pub failing_reads: Mutex<Vec<String>>,
        pub command_status: Mutex<Vec<(String, u8)>>,
    }

    impl MockLink {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn set_read_value(&self, attribute: &str, value: Value) {
            self.read_values.lock().unwrap().insert(attribute.to_string(), value);
        }

        pub fn fail_read(&self, attribute: &str) {
            self.failing_reads.lock().unwrap().push(attribute.to_string());
        }

        pub fn set_command_status(&self, command: &str, status: u8) {
            self.command_status.lock().unwrap().push((command.to_string(), status));
        }
    }

    #[async_trait]
    impl ZclLink for MockLink {
        async fn read(
            &self,
            target: &EntityId,
            cluster: Cluster,
            attributes: &[AttributeId],
            options: &ZclOptions,
        ) -> Result<Map<String, Value>, ZclError> {
            self.calls.lock().unwrap().push(Call::Read {
                target: *target,
                cluster: cluster.id,
                attributes: attributes.to_vec(),
                options: options.clone(),
            });
            let failing = self.failing_reads.lock().unwrap();
            let values = self.read_values.lock().unwrap();
            let mut result = Map::new();
            for attribute in attributes {
                let name = attribute.to_string();
                if failing.contains(&name) {
                    return Err(ZclError::UnsupportedAttribute {
                        cluster: cluster.to_string(),
                        attribute: name,
                    });
                }
                if let Some(value) = values.get(&name) {
                    result.insert(name, value.clone());
                }
            }
            Ok(result)
        }

        async fn write(
            &self,
            target: &EntityId,
            cluster: Cluster,
            attributes: &[(AttributeId, AttributeValue)],
            options: &ZclOptions,
        ) -> Result<(), ZclError> {
            self.calls.lock().unwrap().push(Call::Write {
                target: *target,
                cluster: cluster.id,
                attributes: attributes.to_vec(),
                options: options.clone(),
            });
            Ok(())
        }

        async fn command(
            &self,
            target: &EntityId,
            cluster: Cluster,
            command: &str,
            payload: &Value,
            options: &ZclOptions,
        ) -> Result<CommandResponse, ZclError> {
            self.calls.lock().unwrap().push(Call::Command {
                target: *target,
                cluster: cluster.id,
                command: command.to_string(),
                payload: payload.clone(),
                options: options.clone(),
            });
            let status = self
                .command_status
                .lock()
                .unwrap()
                .iter()
                .find(|(name, _)| name == command)
                .map_or(0, |(_, status)| *status);
            Ok(CommandResponse::with_status(status))
        }

        async fn command_response(
            &self,
            target: &EntityId,
            cluster: Cluster,
            command: &str,
            payload: &Value,
            options: &ZclOptions,
        ) -> Result<(), ZclError> {
            self.calls.lock().unwrap().push(Call::CommandResponse {
                target: *target,
                cluster: cluster.id,
                command: command.to_string(),
                payload: payload.clone(),
                options: options.clone(),
            });
            Ok(())
        }
    }

    pub fn endpoint(link: &Arc<MockLink>) -> Entity {
        let device = DeviceDescriptor::new([1, 0, 0, 0, 0, 0, 0, 0]);
        Entity::Endpoint(Arc::new(EndpointEntity::new(Arc::new(device), 1, link.clone())))
    }
}
