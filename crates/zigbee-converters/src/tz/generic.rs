//! Generic converters: raw ZCL access and attributes every device may carry

use serde_json::{json, Map, Value};
use zcl_protocol::{AttributeId, AttributeValue, Cluster, ZclError, ZclOptions};
use zigbee_core::units::{display_value, lookup_value, number_value, require_number, require_object, require_string, Lookup};
use zigbee_core::{Entity, ValueError};

use super::{patch, zcl_options};
use crate::converter::{ConvertOutcome, Meta, SetResult};
use crate::error::ConvertError;

const POWER_ON_BEHAVIOR: Lookup<u8> = &[("off", 0), ("on", 1), ("toggle", 2), ("previous", 255)];

const DEFAULT_IDENTIFY_TIMEOUT: f64 = 3.0;

fn field<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ValueError> {
    object.get(key).ok_or_else(|| ValueError::MissingField(key.to_string()))
}

/// Frame options given inline in a request
fn request_options(object: &Map<String, Value>) -> Result<ZclOptions, ValueError> {
    match object.get("options") {
        None | Some(Value::Null) => Ok(ZclOptions::default()),
        Some(options) => serde_json::from_value(options.clone())
            .map_err(|e| ValueError::Invalid(format!("Invalid options '{options}': {e}"))),
    }
}

fn attribute_id(raw: &str) -> AttributeId {
    raw.parse::<u16>().map_or_else(|_| AttributeId::from(raw), AttributeId::from)
}

/// Attributes to read: names or numeric ids
fn read_attributes(value: &Value) -> Result<Vec<AttributeId>, ValueError> {
    let list = value
        .as_array()
        .ok_or_else(|| ValueError::Invalid(format!("'attributes' must be a list, got {value}")))?;
    list.iter()
        .map(|attribute| match attribute {
            Value::String(name) => Ok(attribute_id(name)),
            Value::Number(n) => n
                .as_u64()
                .and_then(|id| u16::try_from(id).ok())
                .map(AttributeId::from)
                .ok_or_else(|| ValueError::Invalid(format!("Invalid attribute id {n}"))),
            other => Err(ValueError::Invalid(format!("Invalid attribute {other}"))),
        })
        .collect()
}

/// Write records: `{attr: value}` or `{attr: {value, type}}` for raw ids
fn write_records(payload: &Map<String, Value>) -> Vec<(AttributeId, AttributeValue)> {
    payload
        .iter()
        .map(|(attribute, value)| {
            let record = match value {
                Value::Object(obj) if obj.contains_key("value") && obj.contains_key("type") => {
                    let data_type = obj.get("type").and_then(Value::as_u64).and_then(|t| u8::try_from(t).ok());
                    AttributeValue {
                        value: obj.get("value").cloned().unwrap_or(Value::Null),
                        data_type,
                    }
                }
                other => AttributeValue::new(other.clone()),
            };
            (attribute_id(attribute), record)
        })
        .collect()
}

/// Read arbitrary attributes; the result lands in `state_property` when given
pub async fn read(entity: &Entity, value: &Value, _meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "read")?;
    let cluster = Cluster::resolve(field(request, "cluster")?)?;
    let attributes = read_attributes(field(request, "attributes")?)?;
    let options = request_options(request)?;

    let result = Value::Object(entity.read(cluster, &attributes, &options).await?);
    tracing::info!("Read result of '{}': {}", cluster, result);

    match request.get("state_property").and_then(Value::as_str) {
        Some(property) => Ok(Some(ConvertOutcome::single(property, result))),
        None => Ok(None),
    }
}

/// Write arbitrary attributes
pub async fn write(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "write")?;
    let cluster = Cluster::resolve(field(request, "cluster")?)?;
    let payload = require_object(field(request, "payload")?, "payload")?;
    let options = zcl_options(&meta.mapped).merge(&request_options(request)?);

    entity.write(cluster, &write_records(payload), &options).await?;
    let written = Value::Object(payload.clone());
    tracing::info!("Wrote '{}' to '{}'", written, cluster);
    Ok(None)
}

/// Send an arbitrary cluster command
pub async fn command(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "command")?;
    let cluster = Cluster::resolve(field(request, "cluster")?)?;
    let name = require_string(field(request, "command")?, "command")?;
    let payload = match request.get("payload") {
        None | Some(Value::Null) => json!({}),
        Some(payload) => payload.clone(),
    };

    entity
        .command(cluster, name, payload.clone(), &zcl_options(&meta.mapped))
        .await?;
    tracing::info!("Invoked '{}.{}' with payload '{}'", cluster, name, payload);
    Ok(None)
}

pub async fn factory_reset(entity: &Entity, meta: &Meta<'_>) -> SetResult {
    entity
        .command(Cluster::BASIC, "resetFactDefault", json!({}), &zcl_options(&meta.mapped))
        .await?;
    Ok(None)
}

/// Blink the device; the request value takes priority over the configured timeout
pub async fn identify(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let seconds = value
        .as_f64()
        .or(meta.options.identify_timeout)
        .unwrap_or(DEFAULT_IDENTIFY_TIMEOUT);
    entity
        .command(
            Cluster::IDENTIFY,
            "identify",
            json!({ "identifytime": number_value(seconds) }),
            &zcl_options(&meta.mapped),
        )
        .await?;
    Ok(None)
}

pub async fn power_on_behavior(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let behavior = require_string(value, "power_on_behavior")?.to_lowercase();
    let raw = lookup_value(&Value::String(behavior.clone()), POWER_ON_BEHAVIOR)?;

    let result = entity
        .write_one(Cluster::ON_OFF, "startUpOnOff", raw, &zcl_options(&meta.mapped))
        .await;
    match result {
        Ok(()) => Ok(Some(ConvertOutcome::single("power_on_behavior", Value::String(behavior)))),
        Err(ZclError::UnsupportedAttribute { .. }) => Err(ConvertError::Unsupported(
            "Got `UNSUPPORTED_ATTRIBUTE` error, device does not support power on behaviour".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Delay in seconds before an occupancy sensor reports unoccupied
pub async fn occupancy_timeout(entity: &Entity, value: &Value) -> SetResult {
    let seconds = require_number(value, "occupancy_timeout")?;
    entity
        .write_one(
            Cluster::OCCUPANCY_SENSING,
            "pirOToUDelay",
            number_value(seconds),
            &ZclOptions::default(),
        )
        .await?;
    Ok(Some(ConvertOutcome::state(patch("occupancy_timeout", number_value(seconds)))))
}

/// Read a single attribute; shared by the plain get operations
pub async fn read_one(entity: &Entity, cluster: Cluster, attribute: &str) -> Result<(), ConvertError> {
    entity.read_names(cluster, &[attribute], &ZclOptions::default()).await?;
    Ok(())
}

/// Error for a value outside what a converter accepts
pub(crate) fn invalid(message: impl Into<String>) -> ConvertError {
    ConvertError::Value(ValueError::Invalid(message.into()))
}

/// Render a request value for an error message
pub(crate) fn show(value: &Value) -> String {
    display_value(value)
}
