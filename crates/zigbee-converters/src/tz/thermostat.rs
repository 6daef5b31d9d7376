//! Thermostats, their user interface configuration and fan control

use serde_json::{json, Value};
use zcl_protocol::{Cluster, ZclOptions};
use zigbee_core::units::{
    ensure_range, lookup_value, normalize_celsius_version_of_fahrenheit, number_value, require_number,
    require_number_in, require_object, require_string, Lookup,
};
use zigbee_core::{Entity, ValueError};

use super::generic::{invalid, read_one};
use super::zcl_options;
use crate::converter::{ConvertOutcome, Converter, Meta, SetResult};
use crate::error::ConvertError;

pub const SYSTEM_MODES: Lookup<u8> = &[
    ("off", 0),
    ("auto", 1),
    ("cool", 3),
    ("heat", 4),
    ("emergency_heating", 5),
    ("precooling", 6),
    ("fan_only", 7),
    ("dry", 8),
    ("sleep", 9),
];

/// Names older clients still send
const LEGACY_SYSTEM_MODES: Lookup<u8> = &[
    ("off", 0),
    ("auto", 1),
    ("cool", 3),
    ("heat", 4),
    ("emergency heating", 5),
    ("precooling", 6),
    ("fan only", 7),
    ("dry", 8),
    ("sleep", 9),
];

pub const CONTROL_SEQUENCES: Lookup<u8> = &[
    ("cooling_only", 0),
    ("cooling_with_reheat", 1),
    ("heating_only", 2),
    ("heating_with_reheat", 3),
    ("cooling_and_heating_4-pipes", 4),
    ("cooling_and_heating_4-pipes_with_reheat", 5),
];

pub const PROGRAMMING_OPERATION_MODES: Lookup<u8> = &[
    ("setpoint", 0),
    ("schedule", 1),
    ("schedule_with_preheat", 3),
    ("eco", 4),
];

const DISPLAY_MODES: Lookup<u8> = &[("celsius", 0), ("fahrenheit", 1)];

const KEYPAD_LOCKOUT: Lookup<u8> = &[
    ("unlock", 0),
    ("lock1", 1),
    ("lock2", 2),
    ("lock3", 3),
    ("lock4", 4),
    ("lock5", 5),
];

pub const FAN_MODES: Lookup<u8> = &[
    ("off", 0),
    ("low", 1),
    ("medium", 2),
    ("high", 3),
    ("on", 4),
    ("auto", 5),
    ("smart", 6),
];

const RAISE_LOWER_MODES: Lookup<u8> = &[("heat", 0), ("cool", 1), ("both", 2), ("0", 0), ("1", 1), ("2", 2)];

const SETPOINT_HOLD: Lookup<u8> = &[("0", 0), ("1", 1)];

/// Wire value from a table, or the raw enum8 number when the name is unknown
fn lookup_or_raw(value: &Value, table: Lookup<u8>) -> Result<Value, ConvertError> {
    match (lookup_value(value, table), value) {
        (Ok(raw), _) => Ok(json!(raw)),
        (Err(_), Value::Number(n)) => {
            let raw = n.as_f64().unwrap_or(f64::NAN);
            Ok(number_value(ensure_range(raw, "value", 0.0, 255.0)?))
        }
        (Err(e), _) => Err(e.into()),
    }
}

async fn write_thermostat(entity: &Entity, attribute: &str, raw: impl Into<Value> + Send) -> Result<(), ConvertError> {
    entity
        .write_one(Cluster::THERMOSTAT, attribute, raw, &ZclOptions::default())
        .await?;
    Ok(())
}

async fn write_ui_config(entity: &Entity, attribute: &str, raw: Value) -> Result<(), ConvertError> {
    entity
        .write_one(Cluster::THERMOSTAT_UI_CONFIG, attribute, raw, &ZclOptions::default())
        .await?;
    Ok(())
}

pub async fn system_mode(entity: &Entity, value: &Value) -> SetResult {
    let raw = match lookup_value(value, SYSTEM_MODES) {
        Ok(raw) => json!(raw),
        Err(_) => lookup_or_raw(value, LEGACY_SYSTEM_MODES)?,
    };
    write_thermostat(entity, "systemMode", raw).await?;
    Ok(Some(ConvertOutcome::single("system_mode", value.clone())))
}

/// Also cached on the endpoint, where dynamic exposes look for it
pub async fn control_sequence(entity: &Entity, value: &Value) -> SetResult {
    let endpoint = entity.as_endpoint().ok_or(ConvertError::NotSupportedForGroups)?;
    let raw = lookup_or_raw(value, CONTROL_SEQUENCES)?;
    write_thermostat(entity, "ctrlSeqeOfOper", raw.clone()).await?;
    endpoint.save_cluster_attribute(Cluster::THERMOSTAT, "ctrlSeqeOfOper", raw);
    Ok(Some(ConvertOutcome::single("control_sequence_of_operation", value.clone())))
}

pub async fn programming_operation_mode(entity: &Entity, value: &Value) -> SetResult {
    let raw = lookup_value(value, PROGRAMMING_OPERATION_MODES).map_err(|_| {
        let allowed: Vec<&str> = PROGRAMMING_OPERATION_MODES.iter().map(|(name, _)| *name).collect();
        invalid(format!("Programming operation mode invalid, must be one of: {}", allowed.join(", ")))
    })?;
    write_thermostat(entity, "programingOperMode", raw).await?;
    Ok(Some(ConvertOutcome::single("programming_operation_mode", value.clone())))
}

pub async fn temperature_display_mode(entity: &Entity, value: &Value) -> SetResult {
    let raw = lookup_or_raw(value, DISPLAY_MODES)?;
    write_ui_config(entity, "tempDisplayMode", raw).await?;
    Ok(Some(ConvertOutcome::single("temperature_display_mode", value.clone())))
}

pub async fn keypad_lockout(entity: &Entity, value: &Value) -> SetResult {
    let raw = lookup_or_raw(value, KEYPAD_LOCKOUT)?;
    write_ui_config(entity, "keypadLockout", raw).await?;
    Ok(Some(ConvertOutcome::single("keypad_lockout", value.clone())))
}

/// Attribute written for a setpoint key
fn setpoint_attribute(key: &str) -> Option<&'static str> {
    Some(match key {
        "occupied_heating_setpoint" => "occupiedHeatingSetpoint",
        "unoccupied_heating_setpoint" => "unoccupiedHeatingSetpoint",
        "occupied_cooling_setpoint" => "occupiedCoolingSetpoint",
        "unoccupied_cooling_setpoint" => "unoccupiedCoolingSetpoint",
        "min_heat_setpoint_limit" => "minHeatSetpointLimit",
        "max_heat_setpoint_limit" => "maxHeatSetpointLimit",
        "min_cool_setpoint_limit" => "minCoolSetpointLimit",
        "max_cool_setpoint_limit" => "maxCoolSetpointLimit",
        _ => return None,
    })
}

/// Setpoint in hundredths of a degree Celsius.
///
/// Celsius input snaps to half degrees; Fahrenheit input is converted first.
#[must_use]
pub fn encode_setpoint(value: f64, fahrenheit: bool) -> f64 {
    if fahrenheit {
        (normalize_celsius_version_of_fahrenheit(value) * 100.0).round()
    } else {
        ((value * 2.0).round() / 2.0 * 100.0).round()
    }
}

pub async fn setpoint(entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
    let attribute = setpoint_attribute(key).ok_or_else(|| invalid(format!("Unknown setpoint '{key}'")))?;
    let requested = require_number(value, key)?;
    let raw = encode_setpoint(requested, meta.options.fahrenheit());
    write_thermostat(entity, attribute, number_value(raw)).await?;
    Ok(Some(ConvertOutcome::single(key, value.clone())))
}

pub async fn local_temperature_calibration(entity: &Entity, value: &Value) -> SetResult {
    let offset = require_number(value, "local_temperature_calibration")?;
    write_thermostat(entity, "localTemperatureCalibration", number_value((offset * 10.0).round())).await?;
    Ok(Some(ConvertOutcome::single("local_temperature_calibration", value.clone())))
}

pub async fn setpoint_raise_lower(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "setpoint_raise_lower")?;
    let field = |name: &str| {
        request
            .get(name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ValueError::MissingField(name.to_string()))
    };
    let mode = lookup_value(field("mode")?, RAISE_LOWER_MODES)?;
    let amount = require_number(field("amount")?, "amount")?;
    entity
        .command(
            Cluster::THERMOSTAT,
            "setpointRaiseLower",
            json!({ "mode": mode, "amount": number_value(amount.round() * 100.0) }),
            &zcl_options(&meta.mapped),
        )
        .await?;
    Ok(None)
}

pub async fn clear_weekly_schedule(entity: &Entity, meta: &Meta<'_>) -> SetResult {
    entity
        .command(Cluster::THERMOSTAT, "clearWeeklySchedule", json!({}), &zcl_options(&meta.mapped))
        .await?;
    Ok(None)
}

pub async fn setpoint_hold(entity: &Entity, value: &Value) -> SetResult {
    let raw = lookup_value(value, SETPOINT_HOLD)?;
    write_thermostat(entity, "tempSetpointHold", raw).await?;
    Ok(None)
}

/// Minutes, 65535 meaning no limit
pub async fn setpoint_hold_duration(entity: &Entity, value: &Value) -> SetResult {
    let raw = require_number_in(value, "temperature_setpoint_hold_duration", 0.0, 65535.0)?;
    write_thermostat(entity, "tempSetpointHoldDuration", number_value(raw.round())).await?;
    Ok(None)
}

/// Bitmap of local temperature, outdoor temperature and occupancy sensed remotely
pub async fn remote_sensing(entity: &Entity, value: &Value) -> SetResult {
    let raw = require_number_in(value, "remote_sensing", 0.0, 7.0)?;
    write_thermostat(entity, "remoteSensing", number_value(raw.round())).await?;
    Ok(Some(ConvertOutcome::single("remote_sensing", value.clone())))
}

pub async fn fan_mode(entity: &Entity, value: &Value) -> SetResult {
    let mode = require_string(value, "fan_mode")?.to_lowercase();
    let raw = lookup_value(&Value::String(mode.clone()), FAN_MODES)?;
    entity
        .write_one(Cluster::FAN_CONTROL, "fanMode", raw, &ZclOptions::default())
        .await?;

    let fan_state = if mode == "off" { "OFF" } else { "ON" };
    let mut outcome = ConvertOutcome::single("fan_mode", Value::String(mode));
    if let Some(state) = outcome.state.as_mut() {
        state.insert("fan_state".to_string(), json!(fan_state));
    }
    Ok(Some(outcome))
}

pub async fn fan_speed(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let speed = require_number_in(value, "speed", 0.0, 254.0)?;
    entity
        .command(
            Cluster::LEVEL_CONTROL,
            "moveToLevel",
            json!({ "level": number_value(speed), "transtime": 0 }),
            &zcl_options(&meta.mapped),
        )
        .await?;
    Ok(Some(ConvertOutcome::single("speed", value.clone())))
}

/// Read the attribute backing a thermostat or fan converter
pub async fn get(converter: Converter, entity: &Entity) -> Result<(), ConvertError> {
    let (cluster, attribute) = match converter {
        Converter::ThermostatSystemMode => (Cluster::THERMOSTAT, "systemMode"),
        Converter::ThermostatControlSequenceOfOperation => (Cluster::THERMOSTAT, "ctrlSeqeOfOper"),
        Converter::ThermostatProgrammingOperationMode => (Cluster::THERMOSTAT, "programingOperMode"),
        Converter::ThermostatTemperatureDisplayMode => (Cluster::THERMOSTAT_UI_CONFIG, "tempDisplayMode"),
        Converter::ThermostatKeypadLockout => (Cluster::THERMOSTAT_UI_CONFIG, "keypadLockout"),
        Converter::ThermostatOccupiedHeatingSetpoint => (Cluster::THERMOSTAT, "occupiedHeatingSetpoint"),
        Converter::ThermostatUnoccupiedHeatingSetpoint => (Cluster::THERMOSTAT, "unoccupiedHeatingSetpoint"),
        Converter::ThermostatOccupiedCoolingSetpoint => (Cluster::THERMOSTAT, "occupiedCoolingSetpoint"),
        Converter::ThermostatUnoccupiedCoolingSetpoint => (Cluster::THERMOSTAT, "unoccupiedCoolingSetpoint"),
        Converter::ThermostatMinHeatSetpointLimit => (Cluster::THERMOSTAT, "minHeatSetpointLimit"),
        Converter::ThermostatMaxHeatSetpointLimit => (Cluster::THERMOSTAT, "maxHeatSetpointLimit"),
        Converter::ThermostatMinCoolSetpointLimit => (Cluster::THERMOSTAT, "minCoolSetpointLimit"),
        Converter::ThermostatMaxCoolSetpointLimit => (Cluster::THERMOSTAT, "maxCoolSetpointLimit"),
        Converter::ThermostatLocalTemperatureCalibration => (Cluster::THERMOSTAT, "localTemperatureCalibration"),
        Converter::ThermostatLocalTemperature => (Cluster::THERMOSTAT, "localTemp"),
        Converter::ThermostatRunningState => (Cluster::THERMOSTAT, "runningState"),
        Converter::ThermostatPiHeatingDemand => (Cluster::THERMOSTAT, "pIHeatingDemand"),
        Converter::ThermostatTemperatureSetpointHold => (Cluster::THERMOSTAT, "tempSetpointHold"),
        Converter::ThermostatTemperatureSetpointHoldDuration => (Cluster::THERMOSTAT, "tempSetpointHoldDuration"),
        Converter::ThermostatRemoteSensing => (Cluster::THERMOSTAT, "remoteSensing"),
        Converter::FanMode => (Cluster::FAN_CONTROL, "fanMode"),
        Converter::FanSpeed => (Cluster::LEVEL_CONTROL, "currentLevel"),
        other => return Err(ConvertError::GetNotSupported(other.name())),
    };
    read_one(entity, cluster, attribute).await
}
