//! Test fixtures: a recording ZCL link, entities and a request context

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use zcl_protocol::{AttributeId, AttributeValue, Cluster, CommandResponse, ZclError, ZclOptions};
use zigbee_core::{DeviceDescriptor, Endpoint, EndpointEntity, Entity, EntityId, EntityStore, GroupEntity, ZclLink};

use crate::converter::{Converter, Mapped, Meta};
use crate::definition::{Definition, DefinitionMeta, DefinitionSpec};
use crate::expose::Expose;
use crate::options::DeviceOptions;
use crate::registry::finalize;

/// One recorded outbound operation
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Read { target: EntityId, cluster: u16, attributes: Vec<AttributeId>, options: ZclOptions },
    Write { target: EntityId, cluster: u16, attributes: Vec<(AttributeId, AttributeValue)>, options: ZclOptions },
    Command { target: EntityId, cluster: u16, command: String, payload: Value, options: ZclOptions },
    CommandResponse { target: EntityId, cluster: u16, command: String, payload: Value, options: ZclOptions },
}

impl Call {
    /// Command name and payload, if this is a command
    pub fn as_command(&self) -> Option<(&str, &Value)> {
        match self {
            Call::Command { command, payload, .. } | Call::CommandResponse { command, payload, .. } => {
                Some((command.as_str(), payload))
            }
            _ => None,
        }
    }
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

    /// Names of the commands sent so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.as_command().map(|(name, _)| name.to_string()))
            .collect()
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

fn ieee(n: u8) -> [u8; 8] {
    [n, 0, 0, 0, 0, 0, 0, 0]
}

pub fn endpoint_entity(link: &Arc<MockLink>, device: DeviceDescriptor, endpoint: u8) -> Arc<EndpointEntity> {
    Arc::new(EndpointEntity::new(Arc::new(device), endpoint, link.clone()))
}

/// Endpoint 1 of a plain device whose IEEE address starts with `n`
pub fn endpoint(link: &Arc<MockLink>, n: u8) -> Entity {
    Entity::Endpoint(endpoint_entity(link, DeviceDescriptor::new(ieee(n)), 1))
}

pub fn endpoint_with_manufacturer(link: &Arc<MockLink>, manufacturer: u16) -> Entity {
    let mut device = DeviceDescriptor::new(ieee(1));
    device.manufacturer_id = Some(manufacturer);
    Entity::Endpoint(endpoint_entity(link, device, 1))
}

/// A color light with the color control cluster on endpoint 1
pub fn color_light(link: &Arc<MockLink>) -> Entity {
    let mut ep = Endpoint::new(1);
    ep.input_clusters = vec![Cluster::ON_OFF.id, Cluster::LEVEL_CONTROL.id, Cluster::COLOR_CONTROL.id];
    let device = DeviceDescriptor::new(ieee(1)).with_model("LCT015").with_endpoint(ep);
    Entity::Endpoint(endpoint_entity(link, device, 1))
}

/// Group `group_id` with `count` plain members
pub fn group(link: &Arc<MockLink>, group_id: u16, count: u8) -> Entity {
    let members = (1..=count)
        .map(|n| endpoint_entity(link, DeviceDescriptor::new(ieee(n)), 1))
        .collect();
    Entity::Group(Arc::new(GroupEntity::new(group_id, members, link.clone())))
}

pub fn definition(model: &str) -> Arc<Definition> {
    let spec = DefinitionSpec::new(model, "Test", "test device")
        .with_from_zigbee(&["on_off"])
        .with_to_zigbee(&[Converter::IgnoreTransition])
        .with_exposes(vec![Expose::binary("state", 7, "ON".into(), "OFF".into())]);
    Arc::new(finalize(&spec).unwrap())
}

pub fn definition_with_meta(meta: DefinitionMeta) -> Arc<Definition> {
    let spec = DefinitionSpec::new("TEST", "Test", "test device")
        .with_from_zigbee(&["on_off"])
        .with_to_zigbee(&[Converter::IgnoreTransition])
        .with_exposes(vec![Expose::binary("state", 7, "ON".into(), "OFF".into())])
        .with_meta(meta);
    Arc::new(finalize(&spec).unwrap())
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

/// Owned request context from which a [`Meta`] is borrowed
pub struct Context {
    pub message: Map<String, Value>,
    pub state: Map<String, Value>,
    pub options: DeviceOptions,
    pub definition: Arc<Definition>,
    /// Set for group requests, one definition per member
    pub group_definitions: Option<Vec<Arc<Definition>>>,
    pub endpoint_name: Option<String>,
    pub members_state: Option<Map<String, Value>>,
    pub store: EntityStore,
}

impl Context {
    pub fn new() -> Self {
        Self {
            message: Map::new(),
            state: Map::new(),
            options: DeviceOptions::default(),
            definition: definition("TEST"),
            group_definitions: None,
            endpoint_name: None,
            members_state: None,
            store: EntityStore::new(),
        }
    }

    pub fn with_message(mut self, message: Value) -> Self {
        self.message = object(message);
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = object(state);
        self
    }

    pub fn with_meta(mut self, meta: DefinitionMeta) -> Self {
        self.definition = definition_with_meta(meta);
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.definition = definition(model);
        self
    }

    pub fn meta(&self) -> Meta<'_> {
        let mapped = match &self.group_definitions {
            Some(definitions) => Mapped::Group(definitions),
            None => Mapped::Device(&self.definition),
        };
        Meta {
            message: &self.message,
            state: &self.state,
            options: &self.options,
            mapped,
            endpoint_name: self.endpoint_name.as_deref(),
            members_state: self.members_state.as_ref(),
            store: &self.store,
        }
    }
}
