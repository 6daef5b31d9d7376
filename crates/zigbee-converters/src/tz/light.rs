//! On/off and level control for lights, plus light effects and ballast configuration

use std::time::Duration;

use serde_json::{json, Map, Value};
use zcl_protocol::{Cluster, ZclOptions};
use zigbee_core::units::{
    lookup_value, map_number_range, number_value, require_number, require_object, require_string, to_number,
    validate_value, Lookup,
};
use zigbee_core::Entity;

use super::generic::invalid;
use super::{color, entity_to_read, get_transition, meta_value, zcl_options, GroupStrategy};
use crate::converter::{ConvertOutcome, Meta, SetResult};
use crate::error::ConvertError;

const ON_OFF_STATES: &[&str] = &["toggle", "off", "on"];

const EFFECTS: Lookup<u8> = &[
    ("blink", 0),
    ("breathe", 1),
    ("okay", 2),
    ("channel_change", 11),
    ("finish_effect", 254),
    ("stop_effect", 255),
];

const ALERTS: Lookup<u8> = &[("select", 0x00), ("lselect", 0x01), ("none", 0xFF)];

const LEVEL_CONFIG_ATTRIBUTES: &[&str] = &[
    "onOffTransitionTime",
    "onTransitionTime",
    "offTransitionTime",
    "startUpCurrentLevel",
    "onLevel",
    "options",
];

const BALLAST_ATTRIBUTES: &[&str] = &[
    "ballastStatus",
    "minLevel",
    "maxLevel",
    "powerOnLevel",
    "powerOnFadeTime",
    "intrinsicBallastFactor",
    "ballastFactorAdjustment",
    "lampQuantity",
    "lampType",
    "lampManufacturer",
    "lampRatedHours",
    "lampBurnHours",
    "lampAlarmMode",
    "lampBurnHoursTripPoint",
];

/// Settle time before reading back the level after a stopped move
const MOVE_STOP_SETTLE: Duration = Duration::from_millis(500);

fn state_str<'a>(state: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    state.get(key).and_then(Value::as_str)
}

fn present<'a>(message: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    message.get(key).filter(|v| !v.is_null())
}

/// An attribute reported as on, either as boolean or as 1
pub(crate) fn is_on(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(on)) => *on,
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    }
}

/// JSON truthiness of a request flag
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn timed_duration(message: &Map<String, Value>, key: &str) -> Result<f64, ConvertError> {
    match message.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or_default()),
        Some(_) => Err(invalid(format!("The {key} value must be a number!"))),
    }
}

/// Switch with the request's `state`
pub async fn on_off(entity: &Entity, meta: &Meta<'_>) -> SetResult {
    let state = meta.message.get("state").and_then(Value::as_str).map(str::to_lowercase);
    switch(entity, state.as_deref(), meta).await
}

async fn switch(entity: &Entity, state: Option<&str>, meta: &Meta<'_>) -> SetResult {
    let state = state.unwrap_or_default();
    validate_value(state, ON_OFF_STATES)?;
    let options = zcl_options(&meta.mapped);

    let timed = meta.message.get("on_time").is_some_and(|v| !v.is_null())
        || meta.message.get("off_wait_time").is_some_and(|v| !v.is_null());
    if state == "on" && timed {
        let on_time = timed_duration(meta.message, "on_time")?;
        let off_wait_time = timed_duration(meta.message, "off_wait_time")?;
        let payload = json!({
            "ctrlbits": 0,
            "ontime": number_value((on_time * 10.0).round()),
            "offwaittime": number_value((off_wait_time * 10.0).round()),
        });
        entity.command(Cluster::ON_OFF, "onWithTimedOff", payload, &options).await?;
        return Ok(None);
    }

    entity.command(Cluster::ON_OFF, state, json!({}), &options).await?;
    if state == "toggle" {
        let key = format!("state{}", super::endpoint_postfix(meta));
        return Ok(Some(match state_str(meta.state, &key) {
            Some(current) => ConvertOutcome::single("state", json!(if current == "OFF" { "ON" } else { "OFF" })),
            None => ConvertOutcome::default(),
        }));
    }
    Ok(Some(ConvertOutcome::single("state", json!(state.to_uppercase()))))
}

/// Combined state and brightness control.
///
/// Turning off with a transition is done with a level move to 0; the level
/// before that is remembered so the next plain "on" can restore it.
pub async fn onoff_brightness(entity: &Entity, meta: &Meta<'_>) -> SetResult {
    let message = meta.message;
    let id = entity.id();
    let transition = get_transition(entity, "brightness", meta)?;
    let turns_off_at_brightness1 =
        meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, false, |m| m.turns_off_at_brightness1);
    let move_disable = meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, false, |m| {
        m.move_to_level_with_on_off_disable
    });

    // Outer None: not requested; inner None: explicitly null
    let requested_state: Option<Option<String>> = message.get("state").map(|s| s.as_str().map(str::to_lowercase));

    let mut brightness = if let Some(b) = present(message, "brightness") {
        Some(to_number(b, "brightness").unwrap_or(f64::NAN))
    } else {
        present(message, "brightness_percent")
            .map(|p| map_number_range(to_number(p, "brightness_percent").unwrap_or(f64::NAN), 0.0, 100.0, 0.0, 255.0))
    };
    if brightness == Some(255.0) {
        brightness = Some(254.0);
    }
    if let Some(b) = brightness {
        if b.is_nan() || !(0.0..=254.0).contains(&b) {
            return Err(invalid(format!(
                "Brightness value of message: '{}' invalid, must be a number >= 0 and =< 254",
                Value::Object(message.clone())
            )));
        }
    }
    if let Some(Some(state)) = &requested_state {
        if !["on", "off", "toggle"].contains(&state.as_str()) {
            return Err(invalid(format!(
                "State value of message: '{}' invalid, must be 'ON', 'OFF' or 'TOGGLE'",
                Value::Object(message.clone())
            )));
        }
    }
    if requested_state.as_ref().map_or(true, Option::is_none) && brightness.is_none() {
        return Err(invalid(format!(
            "At least one of \"brightness\" or \"state\" must have a value: '{}'",
            Value::Object(message.clone())
        )));
    }

    let state: Option<String> = match requested_state {
        Some(state) => state,
        None if move_disable => state_str(meta.state, "state").map(str::to_lowercase),
        None => Some(if brightness == Some(0.0) { "off" } else { "on" }.to_string()),
    };

    let mut publish_brightness = brightness.is_some();
    let current_state = state_str(meta.state, "state");
    let target = match state.as_deref() {
        Some("toggle") => Some(if current_state == Some("ON") { "off" } else { "on" }),
        other => other,
    };

    if target == Some("off") {
        brightness = (transition.specified || brightness == Some(0.0)).then_some(0.0);
        if brightness.is_some()
            && current_state == Some("OFF")
            && meta_value(entity, &meta.mapped, GroupStrategy::AtLeastOnce, false, |m| {
                m.no_off_transition_when_off
            })
        {
            tracing::debug!("Suppressing OFF transition since entity is OFF and has noOffTransitionWhenOff=true");
            brightness = None;
        }
        if let (Some(current), Some("ON")) = (meta.state.get("brightness"), current_state) {
            meta.store.put(id, "brightness", current.clone());
            meta.store.put(id, "turnedOffWithTransition", json!(brightness.is_some()));
        }
    } else if target == Some("on")
        && brightness.is_none()
        && (transition.specified || meta.store.get(id, "turnedOffWithTransition") == Some(json!(true)))
    {
        // None means "previous"
        let mut on_level: Option<f64> = match meta.state.get("level_config").and_then(|c| c.get("on_level")) {
            Some(Value::String(s)) if s.eq_ignore_ascii_case("previous") => None,
            Some(level) => Some(level.as_f64().unwrap_or_default()),
            None => Some(0.0),
        };
        if on_level == Some(0.0) && meta.store.get(id, "onLevelSupported") != Some(json!(false)) {
            if let Ok(values) = entity
                .read_names(Cluster::LEVEL_CONTROL, &["onLevel"], &ZclOptions::default())
                .await
            {
                if let Some(level) = values.get("onLevel").and_then(Value::as_f64) {
                    on_level = Some(level);
                }
            }
        }
        if on_level == Some(0.0) {
            on_level = None;
            meta.store.put(id, "onLevelSupported", json!(false));
        }
        brightness = Some(match on_level {
            None | Some(255.0) => meta
                .store
                .get(id, "brightness")
                .and_then(|b| b.as_f64())
                .or_else(|| meta.state.get("brightness").and_then(Value::as_f64))
                .unwrap_or(254.0),
            Some(level) => level,
        });
        publish_brightness = true;
    }

    let Some(mut level) = brightness else {
        let mut result = switch(entity, state.as_deref(), meta).await?;
        if let Some(patch) = result.as_mut().and_then(|r| r.state.as_mut()) {
            if patch.get("state") == Some(&json!("ON")) && meta.state.get("brightness").and_then(Value::as_f64) == Some(0.0) {
                patch.insert("brightness".to_string(), json!(1));
            }
        }
        return Ok(result);
    };

    if level == 0.0 && (target == Some("on") || state.is_none()) {
        level = 1.0;
    }
    if level == 1.0 && turns_off_at_brightness1 {
        level = 2.0;
    }

    if target != Some("off") {
        meta.store.put(id, "brightness", number_value(level));
        meta.store.clear(id, "turnedOffWithTransition");
    }

    let options = zcl_options(&meta.mapped);
    let payload = json!({"level": number_value(level), "transtime": transition.transtime()});
    if move_disable {
        let differs = current_state.is_some_and(|s| Some(s.to_lowercase().as_str()) != target);
        if differs {
            if target == Some("on") {
                entity.command(Cluster::LEVEL_CONTROL, "moveToLevel", payload, &options).await?;
            }
            switch(entity, state.as_deref(), meta).await?;
        } else {
            entity.command(Cluster::LEVEL_CONTROL, "moveToLevel", payload, &options).await?;
        }
    } else {
        let command = if state.is_none() { "moveToLevel" } else { "moveToLevelWithOnOff" };
        entity.command(Cluster::LEVEL_CONTROL, command, payload, &options).await?;
    }

    let mut patch = Map::new();
    if publish_brightness {
        patch.insert("brightness".to_string(), number_value(level));
    }
    if state.is_some() && !move_disable {
        patch.insert("state".to_string(), json!(if level == 0.0 { "OFF" } else { "ON" }));
    }
    let mut outcome = ConvertOutcome::state(patch);
    if transition.specified && transition.time > 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = (transition.time * 10.0).round() as u64;
        outcome = outcome.with_read_after_write(millis);
    }
    Ok(Some(outcome))
}

/// Like [`onoff_brightness`], but a plain "on" restores the last known brightness
pub async fn onoff_restorable_brightness(entity: &Entity, meta: &Meta<'_>) -> SetResult {
    let turning_on = meta
        .message
        .get("state")
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case("on"));
    let has_brightness = present(meta.message, "brightness").is_some() || present(meta.message, "brightness_percent").is_some();
    let previous = meta.state.get("brightness").filter(|b| b.as_f64().is_some_and(|b| b > 0.0));

    match previous {
        Some(previous) if turning_on && !has_brightness => {
            let mut message = meta.message.clone();
            message.insert("brightness".to_string(), previous.clone());
            let meta = Meta { message: &message, ..*meta };
            onoff_brightness(entity, &meta).await
        }
        _ => onoff_brightness(entity, meta).await,
    }
}

pub async fn onoff_brightness_get(entity: &Entity, key: &str) -> Result<(), ConvertError> {
    let options = ZclOptions::default();
    match key {
        "brightness" => {
            entity.read_names(Cluster::LEVEL_CONTROL, &["currentLevel"], &options).await?;
        }
        "state" => {
            entity.read_names(Cluster::ON_OFF, &["onOff"], &options).await?;
        }
        _ => {}
    }
    Ok(())
}

pub async fn brightness_step(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let on_off = key.ends_with("_onoff");
    let step = to_number(value, key)?;
    let transition = get_transition(entity, key, meta)?;
    let payload = json!({
        "stepmode": if step > 0.0 { 0 } else { 1 },
        "stepsize": number_value(step.abs()),
        "transtime": transition.transtime(),
    });
    let command = if on_off { "stepWithOnOff" } else { "step" };
    entity
        .command(Cluster::LEVEL_CONTROL, command, payload, &zcl_options(&meta.mapped))
        .await?;

    let Some(current) = meta.state.get("brightness") else {
        return Ok(None);
    };
    let current = require_number(current, "brightness")?;
    let current_state = state_str(meta.state, "state");

    let mut brightness = if on_off || current_state == Some("ON") { current + step } else { current };
    if step == 0.0 {
        if let Some(target) = entity_to_read(entity) {
            let values = target
                .read_names(Cluster::LEVEL_CONTROL, &["currentLevel"], &ZclOptions::default())
                .await?;
            if let Some(level) = values.get("currentLevel").and_then(Value::as_f64) {
                brightness = level;
            }
        }
    }
    let floor = if on_off || current_state == Some("OFF") { 0.0 } else { 1.0 };
    brightness = brightness.min(254.0).max(floor);

    if meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, false, |m| m.turns_off_at_brightness1) {
        if on_off && step < 0.0 && brightness == 1.0 {
            brightness = 0.0;
        } else if on_off && step > 0.0 && current == 0.0 {
            brightness += 1.0;
        }
    }

    let mut patch = Map::new();
    patch.insert("brightness".to_string(), number_value(brightness));
    patch.insert("state".to_string(), json!(if brightness == 0.0 { "OFF" } else { "ON" }));
    Ok(Some(ConvertOutcome::state(patch)))
}

pub async fn brightness_move(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let options = zcl_options(&meta.mapped);
    if value == "stop" || value.as_f64() == Some(0.0) {
        entity.command(Cluster::LEVEL_CONTROL, "stop", json!({}), &options).await?;

        // The resulting level is only known to the device
        tokio::time::sleep(MOVE_STOP_SETTLE).await;
        let Some(target) = entity_to_read(entity) else {
            return Ok(None);
        };
        let defaults = ZclOptions::default();
        let on_off = target.read_names(Cluster::ON_OFF, &["onOff"], &defaults).await?;
        let level = target.read_names(Cluster::LEVEL_CONTROL, &["currentLevel"], &defaults).await?;

        let mut patch = Map::new();
        patch.insert(
            "brightness".to_string(),
            level.get("currentLevel").cloned().unwrap_or(Value::Null),
        );
        patch.insert(
            "state".to_string(),
            json!(if is_on(on_off.get("onOff")) { "ON" } else { "OFF" }),
        );
        return Ok(Some(ConvertOutcome::state(patch)));
    }

    let rate = to_number(value, key)?;
    let payload = json!({"movemode": if rate > 0.0 { 0 } else { 1 }, "rate": number_value(rate.abs())});
    let command = if key.ends_with("onoff") { "moveWithOnOff" } else { "move" };
    entity.command(Cluster::LEVEL_CONTROL, command, payload, &options).await?;
    Ok(None)
}

/// Identify effects and color loops; `alert` and `flash` are the legacy spellings
pub async fn effect(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let options = zcl_options(&meta.mapped);
    if key == "effect" {
        let effect = require_string(value, key)?.to_lowercase();
        match effect.as_str() {
            "colorloop" => {
                let transition = meta.message.get("transition").cloned().unwrap_or(json!(15));
                let transition = require_number(&transition, "transition")?;
                let speed = (255.0 / transition).round().clamp(1.0, 255.0);
                color::hue_saturation_move(entity, "hue_move", &number_value(speed), meta).await?;
            }
            "stop_colorloop" => {
                color::hue_saturation_move(entity, "hue_move", &json!("stop"), meta).await?;
            }
            _ => {
                let id = lookup_value(&Value::String(effect), EFFECTS)?;
                entity
                    .command(Cluster::IDENTIFY, "triggerEffect", json!({"effectid": id, "effectvariant": 0}), &options)
                    .await?;
            }
        }
        return Ok(None);
    }

    let alert = match (key, value.as_u64()) {
        ("flash", Some(2)) => json!("select"),
        ("flash", Some(10)) => json!("lselect"),
        _ => value.clone(),
    };
    let id = lookup_value(&alert, ALERTS)?;
    entity
        .command(Cluster::IDENTIFY, "triggerEffect", json!({"effectid": id, "effectvariant": 0}), &options)
        .await?;
    Ok(None)
}

/// Transition time field: `disabled` selects the on/off transition time
fn transition_field(value: &Value, key: &str) -> Result<(f64, Value), ConvertError> {
    let raw = match value {
        Value::String(s) if s.eq_ignore_ascii_case("disabled") => 65535.0,
        other => to_number(other, key)?,
    };
    let raw = if raw > 65535.0 {
        65534.0
    } else {
        raw.max(0.0)
    };
    let reported = if raw == 65535.0 { json!("disabled") } else { number_value(raw) };
    Ok((raw, reported))
}

pub async fn level_config(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let parsed;
    let value = match value {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).map_err(|_| invalid("Payload is not valid JSON"))?;
            &parsed
        }
        other => other,
    };
    let config = require_object(value, "level_config")?;
    let options = zcl_options(&meta.mapped);

    // (state key, attribute, wire value, reported value); every field is
    // parsed before the first write goes out
    let mut writes: Vec<(&str, &str, Value, Value)> = Vec::new();

    if let Some(v) = present(config, "on_off_transition_time") {
        let time = number_value(to_number(v, "on_off_transition_time")?.clamp(0.0, 65535.0));
        writes.push(("on_off_transition_time", "onOffTransitionTime", time.clone(), time));
    }

    for (key, attribute) in [("on_transition_time", "onTransitionTime"), ("off_transition_time", "offTransitionTime")] {
        if let Some(v) = present(config, key) {
            let (raw, reported) = transition_field(v, key)?;
            writes.push((key, attribute, number_value(raw), reported));
        }
    }

    if let Some(v) = present(config, "current_level_startup") {
        let raw = match v {
            Value::String(s) if s.eq_ignore_ascii_case("previous") => 255.0,
            Value::String(s) if s.eq_ignore_ascii_case("minimum") => 0.0,
            other => to_number(other, "current_level_startup")?,
        };
        let raw = if raw > 255.0 {
            254.0
        } else if raw < 0.0 {
            1.0
        } else {
            raw
        };
        let reported = match raw {
            r if r == 255.0 => json!("previous"),
            r if r == 0.0 => json!("minimum"),
            r => number_value(r),
        };
        writes.push(("current_level_startup", "startUpCurrentLevel", number_value(raw), reported));
    }

    if let Some(v) = present(config, "on_level") {
        let raw = match v {
            Value::String(s) if s.eq_ignore_ascii_case("previous") => 255.0,
            other => to_number(other, "on_level")?,
        };
        let raw = if raw > 255.0 { 254.0 } else { raw.max(1.0) };
        let reported = if raw == 255.0 { json!("previous") } else { number_value(raw) };
        writes.push(("on_level", "onLevel", number_value(raw), reported));
    }

    if let Some(v) = present(config, "execute_if_off") {
        let execute_if_off = truthy(v);
        writes.push(("execute_if_off", "options", json!(u8::from(execute_if_off)), json!(execute_if_off)));
    }

    let mut state = Map::new();
    for (key, attribute, raw, reported) in writes {
        entity.write_one(Cluster::LEVEL_CONTROL, attribute, raw, &options).await?;
        state.insert(key.to_string(), reported);
    }

    if state.is_empty() {
        return Ok(None);
    }
    Ok(Some(ConvertOutcome::single("level_config", Value::Object(state))))
}

/// All level config attributes are optional, so each is read on its own
pub async fn level_config_get(entity: &Entity) -> Result<(), ConvertError> {
    entity
        .read_best_effort(Cluster::LEVEL_CONTROL, LEVEL_CONFIG_ATTRIBUTES, &ZclOptions::default())
        .await;
    Ok(())
}

pub(crate) fn snake_to_camel(name: &str) -> String {
    let mut camel = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            camel.extend(c.to_uppercase());
            upper = false;
        } else {
            camel.push(c);
        }
    }
    camel
}

pub(crate) fn camel_to_snake(name: &str) -> String {
    let mut snake = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            snake.push('_');
            snake.push(c.to_ascii_lowercase());
        } else {
            snake.push(c);
        }
    }
    snake
}

pub async fn ballast_config(entity: &Entity, key: &str, value: &Value) -> SetResult {
    let options = ZclOptions::default();
    let attribute = match key {
        "ballast_config" => {
            for (name, attribute_value) in require_object(value, key)? {
                entity
                    .write_one(Cluster::BALLAST_CONFIG, &snake_to_camel(name), attribute_value.clone(), &options)
                    .await?;
            }
            None
        }
        "ballast_minimum_level" => Some("minLevel"),
        "ballast_maximum_level" => Some("maxLevel"),
        "ballast_power_on_level" => Some("powerOnLevel"),
        other => return Err(ConvertError::Unsupported(format!("Unsupported ballast key '{other}'"))),
    };
    if let Some(attribute) = attribute {
        entity
            .write_one(Cluster::BALLAST_CONFIG, attribute, value.clone(), &options)
            .await?;
    }
    Ok(Some(ConvertOutcome::single(key, value.clone())))
}

pub async fn ballast_config_get(entity: &Entity) -> Result<(), ConvertError> {
    let result = entity
        .read_best_effort(Cluster::BALLAST_CONFIG, BALLAST_ATTRIBUTES, &ZclOptions::default())
        .await;
    let snake: Map<String, Value> = result
        .values
        .into_iter()
        .map(|(name, value)| (camel_to_snake(&name), value))
        .collect();
    let snake = Value::Object(snake);
    tracing::debug!("ballast_config attribute results received: {}", snake);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DefinitionMeta;
    use crate::testing::{self, Call, Context, MockLink};
    use std::sync::Arc;
    use zcl_protocol::{AttributeId, AttributeValue};

    fn last_command(link: &MockLink) -> (String, Value) {
        let calls = link.calls();
        let (name, payload) = calls.iter().rev().find_map(Call::as_command).unwrap();
        (name.to_string(), payload.clone())
    }

    #[tokio::test]
    async fn test_on_off_states() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let ctx = Context::new().with_message(json!({"state": "ON"}));
        let outcome = on_off(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"state": "ON"}))));
        assert_eq!(last_command(&link), ("on".to_string(), json!({})));

        let ctx = Context::new().with_message(json!({"state": "toggle"})).with_state(json!({"state": "ON"}));
        let outcome = on_off(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"state": "OFF"}))));

        let ctx = Context::new().with_message(json!({"state": "toggle"}));
        let outcome = on_off(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome, ConvertOutcome::default());

        let ctx = Context::new().with_message(json!({"state": "dim"}));
        assert!(on_off(&entity, &ctx.meta()).await.is_err());
    }

    #[tokio::test]
    async fn test_on_with_timed_off() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let ctx = Context::new().with_message(json!({"state": "on", "on_time": 2.5}));
        assert!(on_off(&entity, &ctx.meta()).await.unwrap().is_none());
        assert_eq!(
            last_command(&link),
            ("onWithTimedOff".to_string(), json!({"ctrlbits": 0, "ontime": 25, "offwaittime": 0}))
        );

        let ctx = Context::new().with_message(json!({"state": "on", "off_wait_time": "5"}));
        let err = on_off(&entity, &ctx.meta()).await.unwrap_err();
        assert_eq!(err.to_string(), "The off_wait_time value must be a number!");
    }

    #[tokio::test]
    async fn test_brightness_with_transition_reports_read_back_delay() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new().with_message(json!({"state": "ON", "brightness": 100, "transition": 2}));

        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 100, "state": "ON"}))));
        assert_eq!(outcome.read_after_write_time, Some(200));
        assert_eq!(
            last_command(&link),
            ("moveToLevelWithOnOff".to_string(), json!({"level": 100, "transtime": 20}))
        );
        assert_eq!(ctx.store.get(entity.id(), "brightness"), Some(json!(100)));
    }

    #[tokio::test]
    async fn test_brightness_validation() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let ctx = Context::new().with_message(json!({"brightness": 300}));
        let err = onoff_brightness(&entity, &ctx.meta()).await.unwrap_err();
        assert!(err.to_string().starts_with("Brightness value of message"));

        let ctx = Context::new().with_message(json!({"state": "blink"}));
        let err = onoff_brightness(&entity, &ctx.meta()).await.unwrap_err();
        assert!(err.to_string().ends_with("must be 'ON', 'OFF' or 'TOGGLE'"));

        let ctx = Context::new().with_message(json!({"state": null}));
        let err = onoff_brightness(&entity, &ctx.meta()).await.unwrap_err();
        assert!(err.to_string().starts_with("At least one of"));
        assert!(link.calls().is_empty());
    }

    #[tokio::test]
    async fn test_brightness_edge_levels() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        // brightness 255 is accepted as 254, percent maps onto 0..255
        let ctx = Context::new().with_message(json!({"brightness_percent": 100}));
        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 254, "state": "ON"}))));

        // explicit null state keeps the state and moves the level only
        let ctx = Context::new().with_message(json!({"state": null, "brightness": 0}));
        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 1}))));
        assert_eq!(last_command(&link), ("moveToLevel".to_string(), json!({"level": 1, "transtime": 0})));

        let ctx = Context::new()
            .with_message(json!({"state": "ON", "brightness": 1}))
            .with_meta(DefinitionMeta { turns_off_at_brightness1: Some(true), ..DefinitionMeta::default() });
        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 2, "state": "ON"}))));
    }

    #[tokio::test]
    async fn test_off_with_transition_then_on_restores_level() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let mut ctx = Context::new()
            .with_message(json!({"state": "OFF", "transition": 1}))
            .with_state(json!({"state": "ON", "brightness": 180}));
        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"state": "OFF"}))));
        assert_eq!(last_command(&link), ("moveToLevelWithOnOff".to_string(), json!({"level": 0, "transtime": 10})));
        assert_eq!(ctx.store.get(entity.id(), "turnedOffWithTransition"), Some(json!(true)));

        // reporting clobbered the brightness meanwhile; the device has no onLevel
        ctx.message = testing::object(json!({"state": "ON"}));
        ctx.state = testing::object(json!({"state": "OFF", "brightness": 0}));
        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 180, "state": "ON"}))));
        assert_eq!(ctx.store.get(entity.id(), "onLevelSupported"), Some(json!(false)));
        assert_eq!(ctx.store.get(entity.id(), "turnedOffWithTransition"), None);
    }

    #[tokio::test]
    async fn test_plain_on_delegates_to_switch() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new()
            .with_message(json!({"state": "ON"}))
            .with_state(json!({"state": "OFF", "brightness": 0}));

        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"state": "ON", "brightness": 1}))));
        assert_eq!(link.commands(), vec!["on"]);
    }

    #[tokio::test]
    async fn test_move_to_level_with_on_off_disabled() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new()
            .with_message(json!({"state": "ON", "brightness": 50}))
            .with_state(json!({"state": "OFF"}))
            .with_meta(DefinitionMeta { move_to_level_with_on_off_disable: Some(true), ..DefinitionMeta::default() });

        let outcome = onoff_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(link.commands(), vec!["moveToLevel", "on"]);
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 50}))));
    }

    #[tokio::test]
    async fn test_restorable_brightness() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new()
            .with_message(json!({"state": "ON"}))
            .with_state(json!({"state": "OFF", "brightness": 77}));

        let outcome = onoff_restorable_brightness(&entity, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 77, "state": "ON"}))));
        assert_eq!(last_command(&link), ("moveToLevelWithOnOff".to_string(), json!({"level": 77, "transtime": 0})));
    }

    #[tokio::test]
    async fn test_brightness_step_clamps() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let ctx = Context::new().with_state(json!({"state": "ON", "brightness": 240}));
        let outcome = brightness_step(&entity, "brightness_step", &json!(40), &ctx.meta())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 254, "state": "ON"}))));
        assert_eq!(
            last_command(&link),
            ("step".to_string(), json!({"stepmode": 0, "stepsize": 40, "transtime": 0}))
        );

        let ctx = Context::new()
            .with_state(json!({"state": "ON", "brightness": 10}))
            .with_meta(DefinitionMeta { turns_off_at_brightness1: Some(true), ..DefinitionMeta::default() });
        let outcome = brightness_step(&entity, "brightness_step_onoff", &json!(-9), &ctx.meta())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 0, "state": "OFF"}))));
        assert_eq!(last_command(&link).0, "stepWithOnOff");

        let ctx = Context::new();
        assert!(brightness_step(&entity, "brightness_step", &json!(5), &ctx.meta()).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_brightness_move_stop_reads_back() {
        let link = Arc::new(MockLink::default());
        link.set_read_value("onOff", json!(1));
        link.set_read_value("currentLevel", json!(87));
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let outcome = brightness_move(&entity, "brightness_move", &json!("stop"), &ctx.meta())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.state, Some(testing::object(json!({"brightness": 87, "state": "ON"}))));

        brightness_move(&entity, "brightness_move_onoff", &json!(-30), &ctx.meta()).await.unwrap();
        assert_eq!(last_command(&link), ("moveWithOnOff".to_string(), json!({"movemode": 1, "rate": 30})));
    }

    #[tokio::test]
    async fn test_effects() {
        let link = Arc::new(MockLink::default());
        let entity = testing::color_light(&link);

        let ctx = Context::new();
        effect(&entity, "effect", &json!("Breathe"), &ctx.meta()).await.unwrap();
        assert_eq!(last_command(&link), ("triggerEffect".to_string(), json!({"effectid": 1, "effectvariant": 0})));

        effect(&entity, "flash", &json!(10), &ctx.meta()).await.unwrap();
        assert_eq!(last_command(&link).1["effectid"], json!(1));

        let ctx = Context::new().with_message(json!({"effect": "colorloop", "transition": 5}));
        effect(&entity, "effect", &json!("colorloop"), &ctx.meta()).await.unwrap();
        assert_eq!(last_command(&link), ("moveHue".to_string(), json!({"movemode": 1, "rate": 51})));

        assert!(effect(&entity, "effect", &json!("disco"), &ctx.meta()).await.is_err());
    }

    #[tokio::test]
    async fn test_level_config_presets() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let value = json!(r#"{"on_transition_time": "disabled", "current_level_startup": "minimum", "on_level": 300, "execute_if_off": true}"#);
        let outcome = level_config(&entity, &value, &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(
            outcome.state,
            Some(testing::object(json!({"level_config": {
                "on_transition_time": "disabled",
                "current_level_startup": "minimum",
                "on_level": 254,
                "execute_if_off": true,
            }})))
        );
        let writes: Vec<(AttributeId, AttributeValue)> = link
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write { attributes, .. } => attributes.into_iter().next(),
                _ => None,
            })
            .collect();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0], (AttributeId::from("onTransitionTime"), AttributeValue::new(65535)));
        assert_eq!(writes[3], (AttributeId::from("options"), AttributeValue::new(1)));

        assert!(level_config(&entity, &json!("{oops"), &ctx.meta()).await.is_err());
        assert!(level_config(&entity, &json!({}), &ctx.meta()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_level_config_rejects_before_writing() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let value = json!({"on_off_transition_time": 5, "on_level": "foo"});
        assert!(level_config(&entity, &value, &ctx.meta()).await.is_err());
        assert!(link.calls().is_empty());
    }

    #[tokio::test]
    async fn test_level_config_get_tolerates_failures() {
        let link = Arc::new(MockLink::default());
        link.fail_read("onLevel");
        let entity = testing::endpoint(&link, 1);
        level_config_get(&entity).await.unwrap();
        assert_eq!(link.calls().len(), LEVEL_CONFIG_ATTRIBUTES.len());
    }

    #[tokio::test]
    async fn test_ballast_config_writes_camel_case() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);

        let outcome = ballast_config(&entity, "ballast_config", &json!({"min_level": 3, "power_on_fade_time": 2}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.state.unwrap()["ballast_config"]["min_level"], json!(3));
        let names: Vec<String> = link
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write { attributes, .. } => Some(attributes[0].0.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["minLevel", "powerOnFadeTime"]);

        ballast_config(&entity, "ballast_maximum_level", &json!(200)).await.unwrap();
        assert_eq!(link.calls().len(), 3);
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(snake_to_camel("lamp_burn_hours_trip_point"), "lampBurnHoursTripPoint");
        assert_eq!(camel_to_snake("lampBurnHoursTripPoint"), "lamp_burn_hours_trip_point");
    }
}
