//! Eurotronic Spirit TRV: manufacturer specific thermostat attributes

use serde_json::{json, Map, Value};
use zcl_protocol::{AttributeId, AttributeValue, Cluster, DataType, Vendor, ZclOptions};
use zigbee_core::units::{lookup_value, lookup_value_or, number_value, require_number, require_number_in, Lookup};
use zigbee_core::Entity;

use super::thermostat::encode_setpoint;
use crate::converter::{ConvertOutcome, Converter, Meta, SetResult};
use crate::error::ConvertError;

const TRV_MODE: u16 = 0x4000;
const VALVE_POSITION: u16 = 0x4001;
const ERROR_STATUS: u16 = 0x4002;
const CURRENT_HEATING_SETPOINT: u16 = 0x4003;
const HOST_FLAGS: u16 = 0x4008;

const FLAG_ALWAYS: u32 = 0x01;
const FLAG_MIRROR_DISPLAY: u32 = 0x02;
const FLAG_BOOST: u32 = 0x04;
const FLAG_DISABLE_OFF: u32 = 0x10;
const FLAG_OFF: u32 = 0x20;
const FLAG_CHILD_LOCK: u32 = 0x80;

const MIRROR_DISPLAY: Lookup<u32> = &[("ON", FLAG_MIRROR_DISPLAY), ("OFF", 0)];
const SYSTEM_MODES: Lookup<u32> = &[("off", FLAG_OFF), ("heat", FLAG_BOOST), ("auto", FLAG_DISABLE_OFF)];
const CHILD_LOCK: Lookup<u32> = &[("LOCK", FLAG_CHILD_LOCK), ("UNLOCK", 0)];
const TRV_MODES: Lookup<u8> = &[("1", 1), ("2", 2)];

fn options() -> ZclOptions {
    ZclOptions::manufacturer(Vendor::Nxp.manufacturer_code())
}

/// The three settings packed into the host flags attribute
#[derive(Debug, Clone, PartialEq)]
pub struct HostFlags<'a> {
    pub mirror_display: Option<&'a Value>,
    pub system_mode: Option<&'a Value>,
    pub child_lock: Option<&'a Value>,
}

impl<'a> HostFlags<'a> {
    /// Current settings as last seen in the device state
    #[must_use]
    pub fn from_state(state: &'a Map<String, Value>) -> Self {
        Self {
            mirror_display: state.get("mirror_display"),
            system_mode: state.get("system_mode"),
            child_lock: state.get("child_lock"),
        }
    }

    /// Attribute value with every flag rebuilt
    #[must_use]
    pub fn encode(&self) -> u32 {
        let flag = |value: Option<&Value>, table: Lookup<u32>, default: u32| {
            value.map_or(default, |v| lookup_value_or(v, table, default))
        };
        FLAG_ALWAYS
            | flag(self.mirror_display, MIRROR_DISPLAY, 0)
            | flag(self.system_mode, SYSTEM_MODES, FLAG_DISABLE_OFF)
            | flag(self.child_lock, CHILD_LOCK, 0)
    }
}

async fn write(entity: &Entity, attribute: u16, value: Value, data_type: DataType) -> Result<(), ConvertError> {
    let record = [(AttributeId::Id(attribute), AttributeValue::typed(value, data_type.code()))];
    entity.write(Cluster::THERMOSTAT, &record, &options()).await?;
    Ok(())
}

/// Set one of system mode, child lock or mirror display; the others keep their state
pub async fn host_flags(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let table = if key.ends_with("child_lock") {
        CHILD_LOCK
    } else if key.ends_with("mirror_display") {
        MIRROR_DISPLAY
    } else {
        SYSTEM_MODES
    };
    lookup_value(value, table)?;

    entity
        .read(Cluster::THERMOSTAT, &[AttributeId::Id(HOST_FLAGS)], &options())
        .await?;

    let mut flags = HostFlags::from_state(meta.state);
    if key.ends_with("child_lock") {
        flags.child_lock = Some(value);
    } else if key.ends_with("mirror_display") {
        flags.mirror_display = Some(value);
    } else {
        flags.system_mode = Some(value);
    }
    let encoded = flags.encode();
    tracing::debug!("Eurotronic host flags for '{}' => {:#04x}", key, encoded);

    write(entity, HOST_FLAGS, json!(encoded), DataType::Uint24).await?;
    Ok(Some(ConvertOutcome::single(key, value.clone())))
}

/// Setpoint written to the valve directly, bypassing the schedule
pub async fn current_heating_setpoint(entity: &Entity, value: &Value) -> SetResult {
    let requested = require_number(value, "current_heating_setpoint")?;
    write(entity, CURRENT_HEATING_SETPOINT, number_value(encode_setpoint(requested, false)), DataType::Int16).await?;
    Ok(None)
}

pub async fn valve_position(entity: &Entity, key: &str, value: &Value) -> SetResult {
    let position = require_number_in(value, key, 0.0, 255.0)?;
    write(entity, VALVE_POSITION, number_value(position), DataType::Uint8).await?;
    Ok(Some(ConvertOutcome::single(key, value.clone())))
}

pub async fn trv_mode(entity: &Entity, key: &str, value: &Value) -> SetResult {
    let mode = lookup_value(value, TRV_MODES)?;
    write(entity, TRV_MODE, json!(mode), DataType::Enum8).await?;
    Ok(Some(ConvertOutcome::single(key, value.clone())))
}

pub async fn get(converter: Converter, entity: &Entity) -> Result<(), ConvertError> {
    let attribute = match converter {
        Converter::EurotronicHostFlags | Converter::EurotronicChildLock | Converter::EurotronicMirrorDisplay => HOST_FLAGS,
        Converter::EurotronicErrorStatus => ERROR_STATUS,
        Converter::EurotronicCurrentHeatingSetpoint => CURRENT_HEATING_SETPOINT,
        Converter::EurotronicValvePosition => VALVE_POSITION,
        Converter::EurotronicTrvMode => TRV_MODE,
        other => return Err(ConvertError::GetNotSupported(other.name())),
    };
    entity
        .read(Cluster::THERMOSTAT, &[AttributeId::Id(attribute)], &options())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Call, Context, MockLink};
    use std::sync::Arc;

    fn written(link: &MockLink) -> Vec<(AttributeId, AttributeValue, ZclOptions)> {
        link.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write { mut attributes, options, .. } => {
                    let (id, value) = attributes.remove(0);
                    Some((id, value, options))
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_child_lock_repacks_all_flags() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new().with_state(json!({"system_mode": "off", "mirror_display": "ON"}));

        let outcome = host_flags(&entity, "child_lock", &json!("LOCK"), &ctx.meta())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"child_lock": "LOCK"}))));

        let calls = link.calls();
        assert!(matches!(&calls[0], Call::Read { attributes, .. } if attributes == &vec![AttributeId::Id(0x4008)]));
        let (id, value, options) = written(&link).remove(0);
        assert_eq!(id, AttributeId::Id(0x4008));
        assert_eq!(value, AttributeValue::typed(0xA3, 0x22));
        assert_eq!(options.manufacturer_code, Some(0x1037));
    }

    #[tokio::test]
    async fn test_system_mode_and_mirror_display() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new().with_state(json!({"child_lock": "UNLOCK", "system_mode": "heat"}));

        host_flags(&entity, "system_mode", &json!("auto"), &ctx.meta()).await.unwrap();
        host_flags(&entity, "eurotronic_mirror_display", &json!("ON"), &ctx.meta()).await.unwrap();

        let values: Vec<AttributeValue> = written(&link).into_iter().map(|(_, v, _)| v).collect();
        assert_eq!(values, vec![AttributeValue::typed(0x11, 0x22), AttributeValue::typed(0x07, 0x22)]);
    }

    #[test]
    fn test_encode_defaults() {
        let state = Map::new();
        assert_eq!(HostFlags::from_state(&state).encode(), 0x11);
    }

    #[tokio::test]
    async fn test_plain_attributes() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        assert!(current_heating_setpoint(&entity, &json!(20.7)).await.unwrap().is_none());
        let outcome = valve_position(&entity, "eurotronic_valve_position", &json!(40)).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"eurotronic_valve_position": 40}))));
        let outcome = trv_mode(&entity, "eurotronic_trv_mode", &json!(1)).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"eurotronic_trv_mode": 1}))));

        let writes = written(&link);
        assert_eq!(writes[0].0, AttributeId::Id(0x4003));
        assert_eq!(writes[0].1, AttributeValue::typed(2050, 0x29));
        assert_eq!(writes[1].1, AttributeValue::typed(40, 0x20));
        assert_eq!(writes[2].1, AttributeValue::typed(1, 0x30));
    }

    #[tokio::test]
    async fn test_invalid_values_send_nothing() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        assert!(valve_position(&entity, "eurotronic_valve_position", &json!("banana")).await.is_err());
        assert!(valve_position(&entity, "eurotronic_valve_position", &json!(300)).await.is_err());
        assert!(trv_mode(&entity, "eurotronic_trv_mode", &json!(300)).await.is_err());
        assert!(host_flags(&entity, "child_lock", &json!("MAYBE"), &ctx.meta()).await.is_err());
        assert!(host_flags(&entity, "mirror_display", &json!(true), &ctx.meta()).await.is_err());
        assert!(host_flags(&entity, "system_mode", &json!("cool"), &ctx.meta()).await.is_err());
        assert!(link.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_reads_manufacturer_attribute() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        get(Converter::EurotronicErrorStatus, &entity).await.unwrap();
        match &link.calls()[0] {
            Call::Read { attributes, options, .. } => {
                assert_eq!(attributes, &vec![AttributeId::Id(0x4002)]);
                assert_eq!(options.manufacturer_code, Some(0x1037));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }
}
