//! Window coverings and level-driven blinds

use serde_json::{json, Map, Value};
use zcl_protocol::{Cluster, ZclOptions};
use zigbee_core::units::{
    lookup_value, map_number_range, number_value, require_number_in, require_object, require_string, Lookup,
};
use zigbee_core::Entity;

use super::light::truthy;
use super::{meta_value, patch, zcl_options, GroupStrategy};
use crate::converter::{ConvertOutcome, Meta, SetResult};
use crate::error::ConvertError;

const STATE_COMMANDS: Lookup<&str> = &[
    ("open", "upOpen"),
    ("close", "downClose"),
    ("stop", "stop"),
    ("on", "upOpen"),
    ("off", "downClose"),
];

const LEVEL_POSITIONS: Lookup<f64> = &[("open", 100.0), ("close", 0.0)];

fn cover_inverted(entity: &Entity, meta: &Meta<'_>) -> bool {
    meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, false, |m| m.cover_inverted)
}

/// The `invert_cover` option, flipped once more for covers mounted inverted
pub(crate) fn invert_requested(entity: &Entity, meta: &Meta<'_>) -> bool {
    let invert_cover = meta.options.invert_cover;
    if cover_inverted(entity, meta) {
        !invert_cover
    } else {
        invert_cover
    }
}

/// Whether lift/tilt percentages are flipped between the device and the state.
///
/// ZCL counts 0 as fully open, the state counts 100 as fully open.
#[must_use]
pub fn percentage_inverted(entity: &Entity, meta: &Meta<'_>) -> bool {
    !invert_requested(entity, meta)
}

pub(crate) fn flip(value: f64, invert: bool) -> f64 {
    if invert {
        100.0 - value
    } else {
        value
    }
}

/// State patch for a reported `currentPositionLiftPercentage` or `currentPositionTiltPercentage`
#[must_use]
pub fn decode_percentage(entity: &Entity, attribute: &str, reported: f64, meta: &Meta<'_>) -> Option<Map<String, Value>> {
    let key = match attribute {
        "currentPositionLiftPercentage" => "position",
        "currentPositionTiltPercentage" => "tilt",
        _ => return None,
    };
    Some(patch(key, number_value(flip(reported, percentage_inverted(entity, meta)))))
}

pub async fn state(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let requested = require_string(value, "state")?.to_lowercase();
    let command = lookup_value(&Value::String(requested), STATE_COMMANDS)?;
    entity
        .command(Cluster::WINDOW_COVERING, command, json!({}), &zcl_options(&meta.mapped))
        .await?;
    Ok(None)
}

pub async fn position_tilt(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let requested = require_number_in(value, key, 0.0, 100.0)?;
    let is_position = key == "position";
    let disable_report = {
        let option = meta.options.cover_position_tilt_disable_report;
        let from_definition = meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, false, |m| {
            m.cover_position_tilt_disable_report
        });
        from_definition != option
    };
    let percentage = number_value(flip(requested, percentage_inverted(entity, meta)));

    let (command, payload) = if is_position {
        ("goToLiftPercentage", json!({ "percentageliftvalue": percentage }))
    } else {
        ("goToTiltPercentage", json!({ "percentagetiltvalue": percentage }))
    };
    entity
        .command(Cluster::WINDOW_COVERING, command, payload, &zcl_options(&meta.mapped))
        .await?;

    if disable_report {
        return Ok(None);
    }
    Ok(Some(ConvertOutcome::single(if is_position { "position" } else { "tilt" }, number_value(requested))))
}

/// Blinds driven through the level control cluster
pub async fn via_brightness(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let options = zcl_options(&meta.mapped);
    let position = if value.is_number() {
        require_number_in(value, "position", 0.0, 100.0)?
    } else {
        let requested = require_string(value, "position")?.to_lowercase();
        if requested == "stop" {
            entity.command(Cluster::LEVEL_CONTROL, "stop", json!({}), &options).await?;
            return Ok(None);
        }
        lookup_value(&Value::String(requested), LEVEL_POSITIONS)?
    };

    let level = map_number_range(flip(position, invert_requested(entity, meta)), 0.0, 100.0, 0.0, 255.0);
    entity
        .command(
            Cluster::LEVEL_CONTROL,
            "moveToLevelWithOnOff",
            json!({ "level": number_value(level), "transtime": 0 }),
            &options,
        )
        .await?;
    Ok(Some(ConvertOutcome::single("position", number_value(position))))
}

pub async fn mode(entity: &Entity, value: &Value) -> SetResult {
    let flags = require_object(value, "cover_mode")?;
    let bit = |name: &str, shift: u8| u8::from(flags.get(name).is_some_and(truthy)) << shift;
    let covering_mode = bit("reversed", 0) | bit("calibration", 1) | bit("maintenance", 2) | bit("led", 3);
    entity
        .write_one(Cluster::WINDOW_COVERING, "windowCoveringMode", covering_mode, &ZclOptions::default())
        .await?;
    Ok(Some(ConvertOutcome::single("cover_mode", value.clone())))
}

pub async fn position_tilt_get(entity: &Entity, key: &str) -> Result<(), ConvertError> {
    let attribute = if key == "tilt" {
        "currentPositionTiltPercentage"
    } else {
        "currentPositionLiftPercentage"
    };
    entity
        .read_names(Cluster::WINDOW_COVERING, &[attribute], &ZclOptions::default())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionMeta;
    use crate::testing::{self, Call, Context, MockLink};
    use std::sync::Arc;
    use zcl_protocol::{AttributeId, AttributeValue};

    #[tokio::test]
    async fn test_state_commands() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        for requested in ["OPEN", "close", "Stop", "on"] {
            assert!(state(&entity, &json!(requested), &ctx.meta()).await.unwrap().is_none());
        }
        assert_eq!(link.commands(), vec!["upOpen", "downClose", "stop", "upOpen"]);
        assert!(state(&entity, &json!("half"), &ctx.meta()).await.is_err());
    }

    #[tokio::test]
    async fn test_position_inverted_round_trip() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let mut ctx = Context::new();
        ctx.options.invert_cover = true;

        let outcome = position_tilt(&entity, "position", &json!(30), &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"position": 30}))));

        let calls = link.calls();
        let (command, payload) = calls[0].as_command().unwrap();
        assert_eq!(command, "goToLiftPercentage");
        let sent = payload["percentageliftvalue"].as_f64().unwrap();

        let decoded = decode_percentage(&entity, "currentPositionLiftPercentage", sent, &ctx.meta()).unwrap();
        assert_eq!(decoded, testing::object(json!({"position": 30})));
    }

    #[tokio::test]
    async fn test_tilt_default_orientation_and_disable_report() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let mut ctx = Context::new();

        position_tilt(&entity, "tilt", &json!(20), &ctx.meta()).await.unwrap();
        assert_eq!(link.calls()[0].as_command(), Some(("goToTiltPercentage", &json!({"percentagetiltvalue": 80}))));

        ctx.options.cover_position_tilt_disable_report = true;
        assert!(position_tilt(&entity, "tilt", &json!(20), &ctx.meta()).await.unwrap().is_none());

        // the definition flag flips the option back
        let mut ctx = ctx.with_meta(DefinitionMeta {
            cover_position_tilt_disable_report: Some(true),
            ..DefinitionMeta::default()
        });
        ctx.options.cover_position_tilt_disable_report = true;
        assert!(position_tilt(&entity, "tilt", &json!(20), &ctx.meta()).await.unwrap().is_some());

        assert!(position_tilt(&entity, "position", &json!("20"), &ctx.meta()).await.is_err());
    }

    #[tokio::test]
    async fn test_via_brightness() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let outcome = via_brightness(&entity, &json!("open"), &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"position": 100}))));
        via_brightness(&entity, &json!(40), &ctx.meta()).await.unwrap();
        assert!(via_brightness(&entity, &json!("STOP"), &ctx.meta()).await.unwrap().is_none());

        let calls = link.calls();
        assert_eq!(calls[0].as_command(), Some(("moveToLevelWithOnOff", &json!({"level": 255, "transtime": 0}))));
        assert_eq!(calls[1].as_command(), Some(("moveToLevelWithOnOff", &json!({"level": 102, "transtime": 0}))));
        assert_eq!(calls[2].as_command(), Some(("stop", &json!({}))));
    }

    #[tokio::test]
    async fn test_out_of_range_position_sends_nothing() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        assert!(position_tilt(&entity, "position", &json!(150), &ctx.meta()).await.is_err());
        assert!(position_tilt(&entity, "tilt", &json!(-5), &ctx.meta()).await.is_err());
        assert!(via_brightness(&entity, &json!(150), &ctx.meta()).await.is_err());
        assert!(link.calls().is_empty());
    }

    #[tokio::test]
    async fn test_mode_bits() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let value = json!({"reversed": true, "calibration": false, "maintenance": true, "led": true});
        let outcome = mode(&entity, &value).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"cover_mode": value}))));
        match &link.calls()[0] {
            Call::Write { attributes, .. } => {
                assert_eq!(attributes[0], (AttributeId::from("windowCoveringMode"), AttributeValue::new(0b1101)));
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_reads_lift_or_tilt() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        position_tilt_get(&entity, "state").await.unwrap();
        position_tilt_get(&entity, "tilt").await.unwrap();

        let attributes: Vec<AttributeId> = link
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Read { attributes, .. } => attributes.into_iter().next(),
                _ => None,
            })
            .collect();
        assert_eq!(
            attributes,
            vec![
                AttributeId::from("currentPositionLiftPercentage"),
                AttributeId::from("currentPositionTiltPercentage")
            ]
        );
    }
}
