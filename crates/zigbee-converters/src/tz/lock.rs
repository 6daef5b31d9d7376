//! Door locks: lock state, PIN codes and user status

use serde_json::{json, Value};
use zcl_protocol::{Cluster, ZclOptions};
use zigbee_core::units::{
    is_in_range, lookup_key, lookup_value, number_value, require_object, require_range, require_string, to_number,
    validate_value, Lookup,
};
use zigbee_core::{Entity, ValueError};

use super::generic::invalid;
use super::light::truthy;
use super::{meta_value, zcl_options, GroupStrategy};
use crate::converter::{ConvertOutcome, Meta, SetResult};
use crate::error::ConvertError;

const SOUND_VOLUMES: &[&str] = &["silent_mode", "low_volume", "high_volume"];

const USER_TYPES: Lookup<u8> = &[
    ("unrestricted", 0),
    ("year_day_schedule", 1),
    ("week_day_schedule", 2),
    ("master", 3),
    ("non_access", 4),
];

const USER_STATUSES: Lookup<u8> = &[("available", 0), ("enabled", 1), ("disabled", 3)];

fn pin_code_count(entity: &Entity, meta: &Meta<'_>) -> u16 {
    meta_value(entity, &meta.mapped, GroupStrategy::First, 0, |m| m.pin_code_count)
}

/// User slot from a request, checked against the slots the lock has
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn user_slot(entity: &Entity, user: Option<&Value>, meta: &Meta<'_>, message: &str) -> Result<u16, ConvertError> {
    let user = user.ok_or_else(|| ValueError::MissingField("user".to_string()))?;
    let slot = to_number(user, "user").map_err(|_| invalid("user must be numbers"))?;
    let count = f64::from(pin_code_count(entity, meta));
    if !is_in_range(0.0, count - 1.0, slot) || slot.fract() != 0.0 {
        return Err(invalid(message));
    }
    Ok(slot as u16)
}

pub async fn lock(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let (requested, pincode) = match value {
        Value::String(state) => (Some(state.to_uppercase()), String::new()),
        Value::Object(request) => (
            request.get("state").and_then(Value::as_str).map(str::to_uppercase),
            request.get("code").and_then(Value::as_str).unwrap_or_default().to_string(),
        ),
        _ => (None, String::new()),
    };
    let state = requested.unwrap_or_else(|| value.to_string());
    validate_value(&state, &["LOCK", "UNLOCK", "TOGGLE"])?;

    let command = format!("{}Door", state.to_lowercase());
    entity
        .command(Cluster::DOOR_LOCK, &command, json!({ "pincodevalue": pincode }), &zcl_options(&meta.mapped))
        .await?;
    Ok(None)
}

pub async fn auto_relock_time(entity: &Entity, value: &Value) -> SetResult {
    let seconds = require_range(value, "auto_relock_time", 0.0, f64::from(u32::MAX))?;
    entity
        .write_one(Cluster::DOOR_LOCK, "autoRelockTime", number_value(seconds), &ZclOptions::default())
        .await?;
    Ok(Some(ConvertOutcome::single("auto_relock_time", value.clone())))
}

pub async fn sound_volume(entity: &Entity, value: &Value) -> SetResult {
    let volume = require_string(value, "sound_volume")?;
    validate_value(volume, SOUND_VOLUMES)?;
    let index = SOUND_VOLUMES.iter().position(|v| *v == volume).unwrap_or_default();
    entity
        .write_one(Cluster::DOOR_LOCK, "soundVolume", index, &ZclOptions::default())
        .await?;
    Ok(Some(ConvertOutcome::single("sound_volume", value.clone())))
}

/// Set or clear the PIN code of one user slot
pub async fn pincode(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "pin_code")?;
    let user = user_slot(entity, request.get("user"), meta, "user must be in range for device")?;
    let options = zcl_options(&meta.mapped);

    let pin_code = match request.get("pin_code") {
        None | Some(Value::Null) => {
            entity
                .command(Cluster::DOOR_LOCK, "clearPinCode", json!({ "userid": user }), &options)
                .await?;
            return Ok(None);
        }
        Some(Value::String(pin)) if pin.chars().all(|c| c.is_ascii_digit()) => pin.clone(),
        Some(Value::Number(pin)) => pin.to_string(),
        Some(_) => return Err(invalid("pinCode must be a number")),
    };

    let enabled = request.get("user_enabled").map_or(true, truthy);
    let user_type = request.get("user_type").cloned().unwrap_or_else(|| json!("unrestricted"));
    let payload = json!({
        "userid": user,
        "userstatus": if enabled { 1 } else { 3 },
        "usertype": lookup_value(&user_type, USER_TYPES)?,
        "pincodevalue": pin_code,
    });
    entity.command(Cluster::DOOR_LOCK, "setPinCode", payload, &options).await?;
    Ok(None)
}

pub async fn user_status(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "user_status")?;
    let user = user_slot(entity, request.get("user"), meta, "user must be in range for device")?;
    let requested = request.get("status").cloned().unwrap_or(Value::Null);
    let status = lookup_value(&requested, USER_STATUSES).map_err(|_| {
        let allowed: Vec<&str> = USER_STATUSES.iter().map(|(name, _)| *name).collect();
        invalid(format!(
            "Unsupported status: '{}', should be one of: {}",
            super::generic::show(&requested),
            allowed.join(",")
        ))
    })?;

    entity
        .command(
            Cluster::DOOR_LOCK,
            "setUserStatus",
            json!({ "userid": user, "userstatus": status }),
            &zcl_options(&meta.mapped),
        )
        .await?;
    Ok(None)
}

/// Query one slot when the request names a user, otherwise every slot
async fn query_slots(entity: &Entity, command: &str, field: &str, meta: &Meta<'_>) -> Result<(), ConvertError> {
    let options = zcl_options(&meta.mapped);
    let requested = meta.message.get(field).and_then(|v| v.get("user"));
    let slots: Vec<u16> = match requested {
        Some(user) => vec![user_slot(entity, Some(user), meta, "userId must be in range for device")?],
        None => (0..pin_code_count(entity, meta)).collect(),
    };
    for slot in slots {
        entity
            .command(Cluster::DOOR_LOCK, command, json!({ "userid": slot }), &options)
            .await?;
    }
    Ok(())
}

pub async fn pincode_get(entity: &Entity, meta: &Meta<'_>) -> Result<(), ConvertError> {
    query_slots(entity, "getPinCode", "pin_code", meta).await
}

pub async fn user_status_get(entity: &Entity, meta: &Meta<'_>) -> Result<(), ConvertError> {
    query_slots(entity, "getUserStatus", "user_status", meta).await
}

/// Name of a user status reported by the lock
#[must_use]
pub fn user_status_name(status: u8) -> &'static str {
    lookup_key(USER_STATUSES, &status).unwrap_or("unknown")
}
