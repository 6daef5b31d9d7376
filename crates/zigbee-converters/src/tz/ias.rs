//! IAS warning devices and alarm panels

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};
use zcl_protocol::{Cluster, ZclOptions};
use zigbee_core::units::{is_in_range, lookup_value, number_value, require_number, require_object, to_number, Lookup};
use zigbee_core::Entity;

use super::generic::{invalid, show};
use super::light::truthy;
use super::zcl_options;
use crate::converter::{ConvertOutcome, Mapped, Meta, SetResult};
use crate::error::ConvertError;

const WARNING_MODES: Lookup<u8> = &[
    ("stop", 0),
    ("burglar", 1),
    ("fire", 2),
    ("emergency", 3),
    ("police_panic", 4),
    ("fire_panic", 5),
    ("emergency_panic", 6),
];

const LEVELS: Lookup<u8> = &[("low", 0), ("medium", 1), ("high", 2), ("very_high", 3)];

const SQUAWK_STATES: Lookup<u8> = &[("system_is_armed", 0), ("system_is_disarmed", 1)];

const ARM_MODES: Lookup<u8> = &[
    ("disarm", 0),
    ("arm_day_zones", 1),
    ("arm_night_zones", 2),
    ("arm_all_zones", 3),
    ("exit_delay", 4),
    ("entry_delay", 5),
    ("not_ready", 6),
    ("in_alarm", 7),
    ("arming_stay", 8),
    ("arming_night", 9),
    ("arming_away", 10),
];

const ARM_NOTIFICATIONS: Lookup<u8> = &[
    ("disarm", 0),
    ("arm_day_zones", 1),
    ("arm_night_zones", 2),
    ("arm_all_zones", 3),
    ("invalid_code", 4),
    ("not_ready", 5),
    ("already_disarmed", 6),
];

const EXIT_DELAY: u8 = 4;
const ENTRY_DELAY: u8 = 5;

/// Longest delay the panel can count down, in seconds
const MAX_SECONDS_REMAIN: f64 = 255.0;

/// Bit order of the `startwarninginfo` byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WarningLayout {
    /// mode in the high nibble, then strobe, then siren level
    Standard,
    /// mode in the low nibble, strobe at bit 4, level at bit 6
    Reversed,
}

const REVERSED_WARNING_MODELS: &[&str] = &["SIRZB-110", "SRAC-23B-ZBSR", "AV2010/29A", "AV2010/24A"];

impl WarningLayout {
    fn for_model(model: Option<&str>) -> Self {
        match model {
            Some(model) if REVERSED_WARNING_MODELS.contains(&model) => WarningLayout::Reversed,
            _ => WarningLayout::Standard,
        }
    }

    fn encode(self, mode: u8, strobe: bool, level: u8) -> u8 {
        let strobe = u8::from(strobe);
        match self {
            WarningLayout::Standard => (mode << 4) + (strobe << 2) + level,
            WarningLayout::Reversed => mode + (strobe << 4) + (level << 6),
        }
    }
}

/// Bit pattern of the on/off siren used by `warning_simple`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimpleAlarmLayout {
    Standard,
    /// Develco firmware 4.0.5 and later
    Develco,
}

const DEVELCO_ALARM_MODELS: &[&str] = &["SMSZB-120", "HESZB-120"];

impl SimpleAlarmLayout {
    fn for_model(model: Option<&str>) -> Self {
        match model {
            Some(model) if DEVELCO_ALARM_MODELS.contains(&model) => SimpleAlarmLayout::Develco,
            _ => SimpleAlarmLayout::Standard,
        }
    }

    fn encode(self, alarm: u8) -> u8 {
        match self {
            SimpleAlarmLayout::Standard => (3 << 6) + (alarm << 2),
            SimpleAlarmLayout::Develco => (alarm << 7) + (alarm << 6),
        }
    }
}

/// Model of the single addressed device
fn device_model<'a>(meta: &Meta<'a>) -> Result<Option<&'a str>, ConvertError> {
    match meta.mapped {
        Mapped::Device(definition) => Ok(Some(definition.model.as_str())),
        Mapped::Group(_) => Err(ConvertError::NotSupportedForGroups),
    }
}

/// Field of a request, `None` when absent, null, empty or false
fn field<'a>(request: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    request.get(name).filter(|v| truthy(v) && v.as_str() != Some(""))
}

pub async fn warning(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let empty = Map::new();
    let request = value.as_object().unwrap_or(&empty);

    let mode = field(request, "mode").cloned().unwrap_or_else(|| json!("emergency"));
    let level = field(request, "level").cloned().unwrap_or_else(|| json!("medium"));
    let strobe = request.get("strobe").filter(|v| !v.is_null()).map_or(true, truthy);
    let duration = request.get("duration").filter(|v| !v.is_null()).cloned().unwrap_or_else(|| json!(10));
    let strobe_duty_cycle = match request.get("strobe_duty_cycle") {
        None | Some(Value::Null) => 0.0,
        Some(cycle) => to_number(cycle, "strobe_duty_cycle")? * 10.0,
    };
    let strobe_level = match request.get("strobe_level") {
        None | Some(Value::Null) => 1,
        Some(requested) => lookup_value(requested, LEVELS)?,
    };

    let layout = WarningLayout::for_model(device_model(meta)?);
    let info = layout.encode(lookup_value(&mode, WARNING_MODES)?, strobe, lookup_value(&level, LEVELS)?);

    let payload = json!({
        "startwarninginfo": info,
        "warningduration": duration,
        "strobedutycycle": number_value(strobe_duty_cycle),
        "strobelevel": strobe_level,
    });
    entity
        .command(Cluster::IAS_WD, "startWarning", payload, &zcl_options(&meta.mapped))
        .await?;
    Ok(None)
}

/// Siren on or off without mode selection
pub async fn warning_simple(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let alarm = u8::from(!(value == "alarm" || value == "OFF"));
    let info = SimpleAlarmLayout::for_model(device_model(meta)?).encode(alarm);
    let payload = json!({
        "startwarninginfo": info,
        "warningduration": 300,
        "strobedutycycle": 0,
        "strobelevel": 0,
    });
    entity
        .command(Cluster::IAS_WD, "startWarning", payload, &zcl_options(&meta.mapped))
        .await?;
    Ok(None)
}

pub async fn squawk(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "squawk")?;
    let state = lookup_value(request.get("state").unwrap_or(&Value::Null), SQUAWK_STATES)?;
    let level = field(request, "level").cloned().unwrap_or_else(|| json!("very_high"));
    let strobe = request.get("strobe").filter(|v| !v.is_null()).is_some_and(truthy);

    let info = state + (u8::from(strobe) << 4) + (lookup_value(&level, LEVELS)? << 6);
    entity
        .command(Cluster::IAS_WD, "squawk", json!({ "squawkinfo": info }), &zcl_options(&meta.mapped))
        .await?;
    Ok(None)
}

pub async fn max_duration(entity: &Entity, value: &Value) -> SetResult {
    entity
        .write_one(Cluster::IAS_WD, "maxDuration", value.clone(), &ZclOptions::default())
        .await?;
    Ok(Some(ConvertOutcome::single("max_duration", value.clone())))
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Drive an IAS ACE keypad.
///
/// With a `transaction` the request answers a pending arm command; without
/// one it announces a new panel status, remembered in the entity store.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub async fn arm_mode(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    if entity.as_endpoint().is_none() {
        return Err(ConvertError::NotSupportedForGroups);
    }
    let request = require_object(value, "arm_mode")?;
    let model = device_model(meta)?;

    let transaction = request.get("transaction").filter(|v| !v.is_null());
    let table = if transaction.is_some() { ARM_NOTIFICATIONS } else { ARM_MODES };
    let requested = request.get("mode").unwrap_or(&Value::Null);
    let mode = lookup_value(requested, table).map_err(|_| {
        let allowed: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
        invalid(format!("Unsupported mode: '{}', should be one of: {}", show(requested), allowed.join(",")))
    })?;

    if let Some(transaction) = transaction {
        let sequence = to_number(transaction, "transaction")?;
        let options = ZclOptions {
            transaction_sequence_number: Some(sequence as u8),
            ..ZclOptions::default()
        };
        entity
            .command_response(Cluster::IAS_ACE, "armRsp", json!({ "armnotification": mode }), &options)
            .await?;
        // the panel status follows with the next arm_mode request
        return Ok(None);
    }

    let panel_status = if model == Some("3400-D") {
        if mode != 0 && mode != EXIT_DELAY {
            0x80
        } else {
            0x00
        }
    } else {
        mode
    };

    let mut seconds_remain = 0;
    let mut delay_until = 0;
    if let Some(delay) = request.get("delay").filter(|v| !v.is_null() && (mode == EXIT_DELAY || mode == ENTRY_DELAY)) {
        let delay = require_number(delay, "delay")?;
        if !is_in_range(0.0, MAX_SECONDS_REMAIN, delay) {
            return Err(invalid(format!("Invalid delay value: {delay} (expected 0 to {MAX_SECONDS_REMAIN})")));
        }
        seconds_remain = delay.round() as u8;
        delay_until = unix_millis() + (delay * 1000.0) as u64;
    }

    let id = entity.id();
    meta.store.put(id, "panelStatus", json!(panel_status));
    meta.store.put(id, "delayUntil", json!(delay_until));
    tracing::debug!("Panel status of {} is now {:#04x}", id, panel_status);

    let payload = json!({
        "panelstatus": panel_status,
        "secondsremain": seconds_remain,
        "audiblenotif": 0,
        "alarmstatus": 0,
    });
    entity
        .command_response(Cluster::IAS_ACE, "panelStatusChanged", payload, &ZclOptions::default())
        .await?;
    Ok(None)
}
