//! toZigbee converter families
//!
//! Each submodule holds the set and get operations of one device domain.
//! The helpers here are shared by all of them: transition handling, frame
//! options from definition meta, group-aware meta lookup and the color
//! temperature range of an entity.

pub mod color;
pub mod cover;
pub mod eurotronic;
pub mod generic;
pub mod ias;
pub mod light;
pub mod livolo;
pub mod lock;
pub mod scene;
pub mod thermostat;

use serde_json::{Map, Value};
use zcl_protocol::{Cluster, Vendor, ZclOptions};
use zigbee_core::color::sync_color_state;
use zigbee_core::units::to_number;
use zigbee_core::{ColorTempRange, EndpointEntity, Entity, Gamut};

use crate::converter::{Mapped, Meta};
use crate::definition::DefinitionMeta;
use crate::error::ConvertError;

/// Transition of a request, in tenths of a second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub time: f64,
    /// Whether the request or the options asked for a transition at all
    pub specified: bool,
}

impl Transition {
    const NONE: Transition = Transition { time: 0.0, specified: false };

    /// Wire value of the transition time
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn transtime(&self) -> u16 {
        self.time.round().clamp(0.0, f64::from(u16::MAX)) as u16
    }
}

/// Transition for `key`; the request's `transition` wins over the configured default
pub fn get_transition(entity: &Entity, key: &str, meta: &Meta<'_>) -> Result<Transition, ConvertError> {
    let ikea = Vendor::Ikea.manufacturer_code();
    // IKEA bulbs drop the brightness part when brightness and color both transition
    if entity.manufacturer_ids().contains(&ikea)
        && key == "brightness"
        && (meta.message.contains_key("color") || meta.message.contains_key("color_temp"))
    {
        return Ok(Transition::NONE);
    }

    if let Some(transition) = meta.message.get("transition") {
        let seconds = to_number(transition, "transition")?;
        return Ok(Transition { time: seconds * 10.0, specified: true });
    }
    if let Some(seconds) = meta.options.transition {
        return Ok(Transition { time: seconds * 10.0, specified: true });
    }
    Ok(Transition::NONE)
}

/// Frame options the definition(s) ask for on every request
#[must_use]
pub fn zcl_options(mapped: &Mapped<'_>) -> ZclOptions {
    let mut options = ZclOptions::default();
    for definition in mapped.definitions() {
        if let Some(disable) = definition.meta.disable_default_response {
            options.disable_default_response = Some(disable);
        }
        if let Some(timeout) = definition.meta.timeout {
            options.timeout = Some(timeout);
        }
    }
    options
}

/// How a meta flag is combined across the members of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStrategy {
    /// Value of the first member that sets it
    First,
    /// The shared value when all members agree, otherwise the default
    AllEqual,
    /// Any member deviating from the default decides
    AtLeastOnce,
}

/// Look up a definition meta flag for an endpoint or a group
pub fn meta_value<T, F>(entity: &Entity, mapped: &Mapped<'_>, strategy: GroupStrategy, default: T, get: F) -> T
where
    T: Copy + PartialEq,
    F: Fn(&DefinitionMeta) -> Option<T>,
{
    let members = entity.members();
    if !entity.is_group() || members.is_empty() {
        return mapped.first().and_then(|d| get(&d.meta)).unwrap_or(default);
    }

    let mut values = Vec::with_capacity(members.len());
    for index in 0..members.len() {
        let value = mapped.definition(index).and_then(|d| get(&d.meta));
        if strategy == GroupStrategy::First {
            if let Some(value) = value {
                return value;
            }
        }
        values.push(value.unwrap_or(default));
    }

    match strategy {
        GroupStrategy::First => default,
        GroupStrategy::AllEqual => match values.split_first() {
            Some((first, rest)) if rest.iter().all(|v| v == first) => *first,
            _ => default,
        },
        GroupStrategy::AtLeastOnce => values.into_iter().find(|v| *v != default).unwrap_or(default),
    }
}

/// Gamut used for color conversions of the addressed device(s)
#[must_use]
pub fn gamut(meta: &Meta<'_>) -> &'static Gamut {
    meta.mapped.first().map_or(&Gamut::CIE1931, |d| d.gamut())
}

fn cached_number(endpoint: &EndpointEntity, attribute: &str) -> Option<f64> {
    endpoint
        .cached_attribute(Cluster::COLOR_CONTROL, attribute)
        .and_then(|v| v.as_f64())
}

/// Physical color temperature range; for a group the range every member supports
#[must_use]
pub fn find_color_temp_range(entity: &Entity) -> ColorTempRange {
    let range = match entity {
        Entity::Endpoint(endpoint) => ColorTempRange {
            min: cached_number(endpoint, "colorTempPhysicalMin"),
            max: cached_number(endpoint, "colorTempPhysicalMax"),
        },
        Entity::Group(_) => {
            let members = entity.members();
            ColorTempRange {
                min: members
                    .iter()
                    .filter_map(|m| cached_number(m, "colorTempPhysicalMin"))
                    .reduce(f64::max),
                max: members
                    .iter()
                    .filter_map(|m| cached_number(m, "colorTempPhysicalMax"))
                    .reduce(f64::min),
            }
        }
    };
    if range.min.is_none() || range.max.is_none() {
        tracing::debug!("Missing colorTempPhysicalMin and/or colorTempPhysicalMax for {}", entity.id());
    }
    range
}

/// Merge the reconciled color keys into `new_state`
#[must_use]
pub fn sync_color(mut new_state: Map<String, Value>, entity: &Entity, meta: &Meta<'_>) -> Map<String, Value> {
    let synced = sync_color_state(
        &new_state,
        meta.state,
        meta.options.color_sync(),
        find_color_temp_range(entity),
        "",
        gamut(meta),
    );
    new_state.extend(synced);
    new_state
}

/// Color control attributes worth reading back for the current request
#[must_use]
pub fn read_color_attributes(entity: &Entity, meta: &Meta<'_>, additional: &[&'static str]) -> Vec<&'static str> {
    let color = meta.message.get("color");
    let requested = |part: &str| match color {
        None | Some(Value::Null) => true,
        Some(Value::Object(obj)) => obj.contains_key(part),
        Some(_) => false,
    };

    let mut attributes = vec!["colorMode"];
    if requested("x") {
        attributes.push("currentX");
    }
    if requested("y") {
        attributes.push("currentY");
    }
    if meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, true, |m| m.supports_hue_and_saturation) {
        if requested("hue") {
            if meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, true, |m| m.supports_enhanced_hue) {
                attributes.push("enhancedCurrentHue");
            } else {
                attributes.push("currentHue");
            }
        }
        if requested("saturation") {
            attributes.push("currentSaturation");
        }
    }
    attributes.extend_from_slice(additional);
    attributes
}

/// Suffix of per-endpoint state keys, e.g. `state_l1`
#[must_use]
pub fn endpoint_postfix(meta: &Meta<'_>) -> String {
    meta.endpoint_name.map(|name| format!("_{name}")).unwrap_or_default()
}

/// State patch with one key
#[must_use]
pub fn patch(key: &str, value: Value) -> Map<String, Value> {
    let mut state = Map::new();
    state.insert(key.to_string(), value);
    state
}

/// The endpoint a converter reads back from: itself or the first group member
#[must_use]
pub fn entity_to_read(entity: &Entity) -> Option<Entity> {
    entity.endpoint_or_first_member().cloned().map(Entity::Endpoint)
}
