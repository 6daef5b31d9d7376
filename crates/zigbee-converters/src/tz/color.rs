//! Color control: xy, hue/saturation and color temperature

use std::time::Duration;

use serde_json::{json, Map, Value};
use zcl_protocol::{Cluster, ZclOptions};
use zigbee_core::units::{map_number_range, number_value, require_number, require_object, to_number, Lookup};
use zigbee_core::{Color, ColorMode, ColorTempRange, ColorXy, Entity};

use super::light::truthy;
use super::{
    entity_to_read, find_color_temp_range, gamut, get_transition, meta_value, read_color_attributes, sync_color,
    zcl_options, GroupStrategy,
};
use crate::converter::{ConvertOutcome, Meta, SetResult};
use crate::error::ConvertError;

/// Color temperature presets that do not depend on the physical range
const FIXED_PRESETS: Lookup<f64> = &[("warm", 454.0), ("neutral", 370.0), ("cool", 250.0)];

/// Startup value that keeps the color temperature from before power loss
const PREVIOUS_COLOR_TEMP: f64 = 65535.0;

fn preset(name: &str, range: ColorTempRange) -> Option<f64> {
    match name {
        "warmest" => range.max,
        "coolest" => range.min,
        other => FIXED_PRESETS.iter().find(|(k, _)| *k == other).map(|(_, v)| *v),
    }
}

fn color_temp_value(key: &str, value: &Value, range: ColorTempRange) -> Result<f64, ConvertError> {
    if key == "color_temp_percent" {
        let percent = require_number(value, key)?;
        return Ok(map_number_range(
            percent,
            0.0,
            100.0,
            range.min.unwrap_or(154.0),
            range.max.unwrap_or(500.0),
        ));
    }
    if let Some(mireds) = value.as_str().and_then(|name| preset(name, range)) {
        return Ok(mireds);
    }
    Ok(to_number(value, key)?)
}

fn scaled(fraction: f64) -> Value {
    number_value(map_number_range(fraction, 0.0, 1.0, 0.0, 65535.0))
}

/// Move to a color given as xy, rgb or hsv
pub async fn color(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let requested = Color::from_converter_arg(value)?;
    let transtime = get_transition(entity, key, meta)?.transtime();
    let supports_hs = meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, true, |m| m.supports_hue_and_saturation);
    let supports_enhanced_hue =
        meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, true, |m| m.supports_enhanced_hue);
    let options = zcl_options(&meta.mapped);
    let mut state = Map::new();

    match requested {
        Color::Hsv(_) if !supports_hs => {
            return Err(ConvertError::Unsupported(
                "This light does not support Hue/Saturation, please use X/Y instead.".to_string(),
            ));
        }
        Color::Rgb(_) | Color::Xy(_) => {
            let mut xy = match requested {
                Color::Rgb(rgb) => rgb.to_xy(gamut(meta)).rounded(4),
                Color::Xy(xy) => xy,
                Color::Hsv(hsv) => hsv.to_xy(gamut(meta)),
            };
            // Some bulbs ignore this exact red
            let red_fix = meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, false, |m| m.apply_red_fix);
            if red_fix && xy.x == 0.701 && xy.y == 0.299 {
                xy = ColorXy::new(0.7006, 0.2993);
            }

            state.insert("color_mode".to_string(), json!(ColorMode::Xy.as_str()));
            state.insert("color".to_string(), Value::Object(xy.to_object()));
            let payload = json!({"transtime": transtime, "colorx": scaled(xy.x), "colory": scaled(xy.y)});
            entity.command(Cluster::COLOR_CONTROL, "moveToColor", payload, &options).await?;
        }
        Color::Hsv(hsv) => {
            let corrected = hsv.corrected(&meta.options.hue_correction);
            state.insert("color_mode".to_string(), json!(ColorMode::Hs.as_str()));
            state.insert("color".to_string(), Value::Object(hsv.to_object(false)));

            if let (Some(level), true) = (corrected.value, value.is_object()) {
                let payload = json!({
                    "level": number_value(map_number_range(level, 0.0, 100.0, 0.0, 254.0)),
                    "transtime": transtime,
                });
                entity
                    .command(Cluster::LEVEL_CONTROL, "moveToLevelWithOnOff", payload, &options)
                    .await?;
            }

            let saturation = corrected
                .saturation
                .map(|s| number_value(map_number_range(s, 0.0, 100.0, 0.0, 254.0)));
            let enhanced_hue = corrected
                .hue
                .map(|h| number_value(map_number_range(h, 0.0, 360.0, 0.0, 65535.0)));
            let hue = corrected
                .hue
                .map(|h| number_value(map_number_range(h, 0.0, 360.0, 0.0, 254.0)));

            let (command, payload) = match (hsv.hue.is_some(), hsv.saturation.is_some()) {
                (true, true) if supports_enhanced_hue => (
                    "enhancedMoveToHueAndSaturation",
                    json!({"transtime": transtime, "enhancehue": enhanced_hue, "saturation": saturation}),
                ),
                (true, true) => (
                    "moveToHueAndSaturation",
                    json!({"transtime": transtime, "hue": hue, "saturation": saturation}),
                ),
                (true, false) => {
                    let direction = value.get("direction").and_then(Value::as_u64).unwrap_or(0);
                    if supports_enhanced_hue {
                        (
                            "enhancedMoveToHue",
                            json!({"transtime": transtime, "enhancehue": enhanced_hue, "direction": direction}),
                        )
                    } else {
                        ("moveToHue", json!({"transtime": transtime, "hue": hue, "direction": direction}))
                    }
                }
                (false, true) => ("moveToSaturation", json!({"transtime": transtime, "saturation": saturation})),
                (false, false) => return Ok(Some(ConvertOutcome::state(sync_color(state, entity, meta)))),
            };
            entity.command(Cluster::COLOR_CONTROL, command, payload, &options).await?;
        }
    }

    Ok(Some(ConvertOutcome::state(sync_color(state, entity, meta))))
}

/// Move to a color temperature in mireds, clamped to the physical range
pub async fn colortemp(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let range = find_color_temp_range(entity);
    let mireds = range.clamp(color_temp_value(key, value, range)?);
    let payload = json!({
        "colortemp": number_value(mireds),
        "transtime": get_transition(entity, key, meta)?.transtime(),
    });
    entity
        .command(Cluster::COLOR_CONTROL, "moveToColorTemp", payload, &zcl_options(&meta.mapped))
        .await?;

    let mut state = Map::new();
    state.insert("color_mode".to_string(), json!(ColorMode::ColorTemp.as_str()));
    state.insert("color_temp".to_string(), number_value(mireds));
    Ok(Some(ConvertOutcome::state(sync_color(state, entity, meta))))
}

/// `color` and `color_temp` in one converter; reads back both on get
pub async fn color_colortemp(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    match key {
        "color" => color(entity, key, value, meta).await,
        "color_temp" | "color_temp_percent" => colortemp(entity, key, value, meta).await,
        _ => Ok(None),
    }
}

/// For lights without color temperature support: temperatures become xy moves
pub async fn color_via_color(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    match key {
        "color" => color(entity, key, value, meta).await,
        "color_temp" | "color_temp_percent" => {
            let mireds = require_number(value, key)?;
            let xy = ColorXy::from_mireds(mireds);
            let payload = json!({
                "transtime": get_transition(entity, key, meta)?.transtime(),
                "colorx": scaled(xy.x),
                "colory": scaled(xy.y),
            });
            entity
                .command(Cluster::COLOR_CONTROL, "moveToColor", payload, &zcl_options(&meta.mapped))
                .await?;

            let mut state = Map::new();
            state.insert("color_mode".to_string(), json!(ColorMode::ColorTemp.as_str()));
            state.insert("color_temp".to_string(), value.clone());
            Ok(Some(ConvertOutcome::state(sync_color(state, entity, meta))))
        }
        _ => Ok(None),
    }
}

pub async fn colortemp_startup(entity: &Entity, value: &Value) -> SetResult {
    let range = find_color_temp_range(entity);
    let mireds = match value.as_str() {
        Some("previous") => PREVIOUS_COLOR_TEMP,
        Some(name) => match preset(name, range) {
            Some(mireds) => mireds,
            None => to_number(value, "color_temp_startup")?,
        },
        None => to_number(value, "color_temp_startup")?,
    };
    let mireds = if mireds == PREVIOUS_COLOR_TEMP { mireds } else { range.clamp(mireds) };

    entity
        .write_one(
            Cluster::COLOR_CONTROL,
            "startUpColorTemperature",
            number_value(mireds),
            &ZclOptions::default(),
        )
        .await?;
    Ok(Some(ConvertOutcome::single("color_temp_startup", number_value(mireds))))
}

/// Wait for a transition to finish, then read back what the device settled on
async fn read_back(entity: &Entity, delay_ms: u64, attributes: &[&str]) -> Result<(), ConvertError> {
    if let Some(target) = entity_to_read(entity) {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        target
            .read_names(Cluster::COLOR_CONTROL, attributes, &ZclOptions::default())
            .await?;
    }
    Ok(())
}

fn settle_delay(transtime: u16) -> u64 {
    100 + u64::from(transtime) * 100
}

pub async fn colortemp_step(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let step = to_number(value, key)?;
    let transtime = get_transition(entity, key, meta)?.transtime();
    let payload = json!({
        "stepmode": if step > 0.0 { 1 } else { 3 },
        "stepsize": number_value(step.abs()),
        "transtime": transtime,
        "minimum": 0,
        "maximum": 600,
    });
    entity
        .command(Cluster::COLOR_CONTROL, "stepColorTemp", payload, &zcl_options(&meta.mapped))
        .await?;

    // Range and color mode are unknown here, so the result is read back
    read_back(entity, settle_delay(transtime), &["colorTemperature"]).await?;
    Ok(None)
}

pub async fn hue_saturation_step(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let step = to_number(value, key)?;
    let (command, attribute) = if key == "hue_step" {
        ("stepHue", "currentHue")
    } else {
        ("stepSaturation", "currentSaturation")
    };
    let transtime = get_transition(entity, key, meta)?.transtime();
    let payload = json!({
        "stepmode": if step > 0.0 { 1 } else { 3 },
        "stepsize": number_value(step.abs()),
        "transtime": transtime,
    });
    entity
        .command(Cluster::COLOR_CONTROL, command, payload, &zcl_options(&meta.mapped))
        .await?;

    read_back(entity, settle_delay(transtime), &[attribute, "colorMode"]).await?;
    Ok(None)
}

pub async fn hue_saturation_move(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let (command, attribute) = if key == "hue_move" {
        ("moveHue", "currentHue")
    } else {
        ("moveSaturation", "currentSaturation")
    };
    let stop = value == "stop" || value.as_f64() == Some(0.0);
    let (rate, movemode) = if stop {
        (1.0, 0)
    } else {
        let rate = to_number(value, key)?;
        (rate.abs(), if rate > 0.0 { 1 } else { 3 })
    };
    entity
        .command(
            Cluster::COLOR_CONTROL,
            command,
            json!({"rate": number_value(rate), "movemode": movemode}),
            &zcl_options(&meta.mapped),
        )
        .await?;

    if stop {
        read_back(entity, 100, &[attribute, "colorMode"]).await?;
    }
    Ok(None)
}

pub async fn color_options(entity: &Entity, value: &Value) -> SetResult {
    let options = require_object(value, "color_options")?;
    let execute_if_off = options.get("execute_if_off").is_some_and(truthy);
    entity
        .write_one(Cluster::COLOR_CONTROL, "options", u8::from(execute_if_off), &ZclOptions::default())
        .await?;
    Ok(Some(ConvertOutcome::single("color_options", value.clone())))
}

pub async fn color_get(entity: &Entity, meta: &Meta<'_>, additional: &[&'static str]) -> Result<(), ConvertError> {
    let attributes = read_color_attributes(entity, meta, additional);
    entity
        .read_names(Cluster::COLOR_CONTROL, &attributes, &ZclOptions::default())
        .await?;
    Ok(())
}

pub async fn colortemp_get(entity: &Entity) -> Result<(), ConvertError> {
    entity
        .read_names(Cluster::COLOR_CONTROL, &["colorMode", "colorTemperature"], &ZclOptions::default())
        .await?;
    Ok(())
}
