//! Livolo switches, sockets, dimmers and curtain motors
//!
//! Livolo devices take commands through byte arrays written to vendor
//! attributes of the power configuration cluster. A plain toggle with
//! sequence number 0 wakes them up first.

use serde_json::{json, Map, Value};
use zcl_protocol::{AttributeId, AttributeValue, Cluster, Vendor, ZclOptions};
use zigbee_core::units::{map_number_range, number_value, require_number_in, require_object, require_string, to_number};
use zigbee_core::Entity;

use super::generic::invalid;
use crate::converter::{ConvertOutcome, Meta, SetResult};
use crate::error::ConvertError;

const SOCKET_SWITCH: u16 = 0x0001;
const DIMMER_LEVEL: u16 = 769;
const COVER_POSITION: u16 = 1025;
const MOTOR_SPEED: u16 = 4609;
const MOTOR_DIRECTION: u16 = 4865;

fn vendor_options() -> ZclOptions {
    ZclOptions {
        manufacturer_code: Some(Vendor::Livolo.manufacturer_code()),
        disable_default_response: Some(true),
        disable_response: Some(true),
        reserved_bits: Some(3),
        direction: Some(1),
        transaction_sequence_number: Some(0xE9),
        ..ZclOptions::default()
    }
}

fn undivided_options() -> ZclOptions {
    ZclOptions {
        write_undiv: Some(true),
        ..vendor_options()
    }
}

fn wake_options() -> ZclOptions {
    ZclOptions {
        transaction_sequence_number: Some(0),
        ..ZclOptions::default()
    }
}

/// Eight byte payload with `first` leading
fn frame(first: u8) -> Value {
    let mut bytes = [0u8; 8];
    bytes[0] = first;
    json!(bytes)
}

async fn wake(entity: &Entity) -> Result<(), ConvertError> {
    entity
        .command(Cluster::ON_OFF, "toggle", json!({}), &wake_options())
        .await?;
    Ok(())
}

async fn write_frame(
    entity: &Entity,
    attribute: u16,
    bytes: Value,
    data_type: Option<u8>,
    options: &ZclOptions,
) -> Result<(), ConvertError> {
    let record = [(AttributeId::Id(attribute), AttributeValue { value: bytes, data_type })];
    entity.write(Cluster::POWER_CONFIG, &record, options).await?;
    Ok(())
}

/// Switch channel of a sub-endpoint name
fn channel(endpoint_name: Option<&str>) -> Option<u8> {
    match endpoint_name.unwrap_or("left") {
        "left" => Some(1),
        "right" => Some(2),
        _ => None,
    }
}

fn on_level(state: &str) -> u8 {
    if state == "on" {
        108
    } else {
        1
    }
}

pub async fn switch_on_off(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let requested = require_string(value, "state")?;
    let Some(channel) = channel(meta.endpoint_name) else {
        return Ok(None);
    };
    entity
        .command(
            Cluster::LEVEL_CONTROL,
            "moveToLevelWithOnOff",
            json!({ "level": on_level(&requested.to_lowercase()), "transtime": channel }),
            &ZclOptions::default(),
        )
        .await?;
    Ok(Some(ConvertOutcome::single("state", json!(requested.to_uppercase()))))
}

/// Switch byte and data type per socket channel
fn socket_channel(name: &str) -> Option<(u8, u8)> {
    match name {
        "left" => Some((1, 1)),
        "right" => Some((2, 2)),
        "bottom_left" => Some((4, 4)),
        "bottom_right" => Some((8, 136)),
        _ => None,
    }
}

pub async fn socket_switch_on_off(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let Some(requested) = value.as_str() else {
        return Ok(None);
    };
    let state = requested.to_lowercase();
    let name = meta.endpoint_name.unwrap_or("left");
    let outcome = ConvertOutcome::single("state", json!(requested.to_uppercase()));

    wake(entity).await?;
    let Some((switch_byte, data_type)) = socket_channel(name) else {
        return Ok(Some(outcome));
    };
    if let Some(channel) = channel(Some(name)) {
        entity
            .command(
                Cluster::LEVEL_CONTROL,
                "moveToLevelWithOnOff",
                json!({ "level": on_level(&state), "transtime": channel }),
                &ZclOptions::default(),
            )
            .await?;
    }
    let bytes = frame(if state == "on" { switch_byte } else { 0 });
    write_frame(entity, SOCKET_SWITCH, bytes, Some(data_type), &vendor_options()).await?;
    Ok(Some(outcome))
}

/// Dimmer brightness in percent from any of the accepted keys
fn dimmer_percent(key: &str, value: f64) -> Result<f64, ConvertError> {
    let (max, label) = match key {
        "level" => (1000.0, "level"),
        "brightness_percent" => (100.0, "brightness_percent"),
        _ => (255.0, "brightness"),
    };
    if !(0.0..=max).contains(&value) {
        return Err(invalid(format!("Dimmer {label} is out of range 0..{max}")));
    }
    Ok(match key {
        "brightness_percent" => value.round(),
        _ => map_number_range(value, 0.0, max, 0.0, 100.0),
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub async fn dimmer_level(entity: &Entity, key: &str, value: &Value) -> SetResult {
    let requested = to_number(value, key)?;
    let percent = dimmer_percent(key, requested)?;

    wake(entity).await?;
    write_frame(entity, DIMMER_LEVEL, frame(percent as u8), Some(1), &undivided_options()).await?;

    let mut state = Map::new();
    state.insert("brightness_percent".to_string(), number_value(percent));
    state.insert("brightness".to_string(), number_value(map_number_range(percent, 0.0, 100.0, 0.0, 255.0)));
    state.insert("level".to_string(), number_value(percent * 10.0));
    Ok(Some(ConvertOutcome::state(state)))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub async fn cover_position(entity: &Entity, value: &Value) -> SetResult {
    let requested = require_number_in(value, "position", 0.0, 100.0)?;
    let closed = 100.0 - requested;

    wake(entity).await?;
    write_frame(entity, COVER_POSITION, frame(closed as u8), Some(1), &undivided_options()).await?;

    let mut state = Map::new();
    state.insert("position".to_string(), value.clone());
    state.insert("moving".to_string(), json!(true));
    Ok(Some(ConvertOutcome::state(state)))
}

/// Motor direction and speed; both are validated before anything is written
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub async fn cover_options(entity: &Entity, value: &Value) -> SetResult {
    let request = require_object(value, "options")?;

    let direction = match request.get("motor_direction") {
        None | Some(Value::Null) => None,
        Some(direction) => match direction.as_str() {
            Some("FORWARD") => Some(0x00),
            Some("REVERSE") => Some(0x80),
            _ => {
                return Err(invalid(format!(
                    "livolo_cover_options: {} is not a valid motor direction (must be one of 'FORWARD' or 'REVERSE')",
                    super::generic::show(direction)
                )))
            }
        },
    };
    let speed = match request.get("motor_speed") {
        None | Some(Value::Null) => None,
        Some(speed) => {
            let speed = to_number(speed, "motor_speed")?;
            if !(20.0..=40.0).contains(&speed) {
                return Err(invalid("livolo_cover_options: Motor speed is out of range (20-40)"));
            }
            Some(speed as u8)
        }
    };

    let options = undivided_options();
    if let Some(direction) = direction {
        write_frame(entity, MOTOR_DIRECTION, frame(direction), None, &options).await?;
    }
    if let Some(speed) = speed {
        write_frame(entity, MOTOR_SPEED, frame(speed), None, &options).await?;
    }
    Ok(None)
}

/// Livolo devices report their state in answer to a toggle
pub async fn get(entity: &Entity) -> Result<(), ConvertError> {
    wake(entity).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Call, Context, MockLink};
    use std::sync::Arc;

    fn writes(link: &MockLink) -> Vec<(AttributeId, AttributeValue, ZclOptions)> {
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
    async fn test_switch_channels() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let mut ctx = Context::new();

        let outcome = switch_on_off(&entity, &json!("on"), &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"state": "ON"}))));
        ctx.endpoint_name = Some("right".to_string());
        switch_on_off(&entity, &json!("OFF"), &ctx.meta()).await.unwrap();
        ctx.endpoint_name = Some("middle".to_string());
        assert!(switch_on_off(&entity, &json!("ON"), &ctx.meta()).await.unwrap().is_none());

        let calls = link.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].as_command(), Some(("moveToLevelWithOnOff", &json!({"level": 108, "transtime": 1}))));
        assert_eq!(calls[1].as_command(), Some(("moveToLevelWithOnOff", &json!({"level": 1, "transtime": 2}))));
    }

    #[tokio::test]
    async fn test_socket_bottom_right_only_wakes() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let mut ctx = Context::new();
        ctx.endpoint_name = Some("bottom_right".to_string());

        socket_switch_on_off(&entity, &json!("on"), &ctx.meta()).await.unwrap();
        assert_eq!(link.commands(), vec!["toggle"]);

        let (id, value, options) = writes(&link).remove(0);
        assert_eq!(id, AttributeId::Id(1));
        assert_eq!(value, AttributeValue { value: json!([8, 0, 0, 0, 0, 0, 0, 0]), data_type: Some(136) });
        assert_eq!(options.manufacturer_code, Some(0x1AD2));
        assert_eq!(options.transaction_sequence_number, Some(0xE9));
        assert_eq!(options.write_undiv, None);
    }

    #[tokio::test]
    async fn test_socket_left_wakes_then_switches() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        socket_switch_on_off(&entity, &json!("off"), &ctx.meta()).await.unwrap();
        assert_eq!(link.commands(), vec!["toggle", "moveToLevelWithOnOff"]);
        match &link.calls()[0] {
            Call::Command { options, .. } => assert_eq!(options.transaction_sequence_number, Some(0)),
            other => panic!("unexpected call {other:?}"),
        }
        assert_eq!(writes(&link)[0].1.value, json!([0, 0, 0, 0, 0, 0, 0, 0]));
        assert!(socket_switch_on_off(&entity, &json!(1), &ctx.meta()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dimmer_level_scales() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let outcome = dimmer_level(&entity, "level", &json!(500)).await.unwrap().unwrap();
        assert_eq!(
            outcome.state,
            Some(testing::object(json!({"brightness_percent": 50, "brightness": 128, "level": 500})))
        );
        let (id, value, options) = writes(&link).remove(0);
        assert_eq!(id, AttributeId::Id(769));
        assert_eq!(value.value, json!([50, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(options.write_undiv, Some(true));

        let err = dimmer_level(&entity, "brightness", &json!(300)).await.unwrap_err();
        assert_eq!(err.to_string(), "Dimmer brightness is out of range 0..255");
    }

    #[tokio::test]
    async fn test_cover_position_inverts() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let outcome = cover_position(&entity, &json!(30)).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"position": 30, "moving": true}))));
        assert_eq!(writes(&link)[0].1.value, json!([70, 0, 0, 0, 0, 0, 0, 0]));

        let calls = link.calls().len();
        assert!(cover_position(&entity, &json!(150)).await.is_err());
        assert_eq!(link.calls().len(), calls);
    }

    #[tokio::test]
    async fn test_cover_options_validate_first() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let err = cover_options(&entity, &json!({"motor_direction": "REVERSE", "motor_speed": 50}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "livolo_cover_options: Motor speed is out of range (20-40)");
        assert!(link.calls().is_empty());

        cover_options(&entity, &json!({"motor_direction": "REVERSE", "motor_speed": 30})).await.unwrap();
        let written = writes(&link);
        assert_eq!(written[0].0, AttributeId::Id(4865));
        assert_eq!(written[0].1.value, json!([0x80, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(written[1].0, AttributeId::Id(4609));
        assert_eq!(written[1].1.value, json!([30, 0, 0, 0, 0, 0, 0, 0]));
    }
}
