//! Device scenes and their local snapshots
//!
//! Every scene command goes to the device first. The snapshot in the
//! [`EntityStore`](zigbee_core::EntityStore) is only touched once the device
//! confirmed the command, or unconditionally for groups since members never
//! answer individually.

use serde_json::{json, Map, Value};
use zcl_protocol::{Cluster, Status};
use zigbee_core::units::{
    lookup_value, map_number_range, number_value, require_number, require_number_in, require_object, require_range,
    to_number, Lookup,
};
use zigbee_core::{Color, ColorMode, ColorXy, Entity, ValueError};

use super::cover::{flip, invert_requested};
use super::{find_color_temp_range, gamut, meta_value, sync_color, zcl_options, GroupStrategy};
use crate::converter::{ConvertOutcome, Meta, SetResult};
use crate::error::ConvertError;

const ON_OFF_CLUSTER: u16 = 6;
const LEVEL_CLUSTER: u16 = 8;
const WINDOW_COVERING_CLUSTER: u16 = 258;
const COLOR_CLUSTER: u16 = 768;

const ON_OFF: Lookup<u8> = &[("OFF", 0), ("ON", 1)];

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scene_id(value: &Value) -> Result<u8, ConvertError> {
    let id = require_range(value, "ID", 0.0, 255.0)?;
    Ok(id as u8)
}

/// Group of the request: the group itself, or `group_id` of an endpoint request
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn group_id(entity: &Entity, request: Option<&Map<String, Value>>) -> Result<u16, ConvertError> {
    if let Entity::Group(group) = entity {
        return Ok(group.group_id());
    }
    match request.and_then(|r| r.get("group_id")).filter(|v| !v.is_null()) {
        Some(requested) => Ok(require_range(requested, "group_id", 0.0, f64::from(u16::MAX))? as u16),
        None => Ok(0),
    }
}

fn check_reserved(group_id: u16, scene_id: u8) -> Result<(), ConvertError> {
    if group_id == 0 && scene_id == 0 {
        return Err(ValueError::Invalid("Scene ID 0 cannot be used with group ID 0 (reserved).".to_string()).into());
    }
    Ok(())
}

fn scene_name(request: Option<&Map<String, Value>>) -> Option<String> {
    request
        .and_then(|r| r.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn device_failure(operation: &'static str, status: u8) -> ConvertError {
    ConvertError::DeviceStatus {
        operation,
        status: Status::describe(status),
    }
}

/// Snapshot the current state under the given scene id
pub async fn store(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = value.as_object();
    let scene = match request {
        Some(request) => scene_id(request.get("ID").unwrap_or(&Value::Null))?,
        None => scene_id(value)?,
    };
    let group = group_id(entity, request)?;
    check_reserved(group, scene)?;

    let response = entity
        .command(
            Cluster::SCENES,
            "store",
            json!({ "groupid": group, "sceneid": scene }),
            &zcl_options(&meta.mapped),
        )
        .await?;

    let name = scene_name(request);
    if entity.is_group() {
        if let Some(members_state) = meta.members_state {
            for member in entity.members() {
                let state = members_state
                    .get(&member.ieee_address())
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                meta.store.save_scene(member.id(), scene, group, &state, name.clone());
            }
        }
    } else if response.status == 0 {
        meta.store.save_scene(entity.id(), scene, group, meta.state, name);
    } else {
        return Err(device_failure("Scene store", response.status));
    }
    tracing::info!("Successfully stored scene {} (group {}) for {}", scene, group, entity.id());
    Ok(Some(ConvertOutcome::state(Map::new())))
}

/// Snapshots stored before `color_mode` was kept get it inferred from their color keys
fn annotate_color_mode(mut state: Map<String, Value>) -> Map<String, Value> {
    if state.contains_key("color_mode") {
        return state;
    }
    let mode = if state.contains_key("color_temp") {
        Some(ColorMode::ColorTemp)
    } else if let Some(color) = state.get("color") {
        Some(if color.get("x").is_some() { ColorMode::Xy } else { ColorMode::Hs })
    } else {
        None
    };
    if let Some(mode) = mode {
        state.insert("color_mode".to_string(), json!(mode.as_str()));
    }
    state
}

pub async fn recall(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let scene = scene_id(value)?;
    let group = group_id(entity, None)?;
    entity
        .command(
            Cluster::SCENES,
            "recall",
            json!({ "groupid": group, "sceneid": scene }),
            &zcl_options(&meta.mapped),
        )
        .await?;

    if entity.is_group() {
        let mut members_state = Map::new();
        for member in entity.members() {
            let recalled = match meta.store.scene(member.id(), scene, group) {
                Some(snapshot) => sync_color(annotate_color_mode(snapshot.state), entity, meta),
                None => {
                    tracing::warn!(
                        "Unknown scene was recalled for {}, can't restore state.",
                        member.ieee_address()
                    );
                    Map::new()
                }
            };
            members_state.insert(member.ieee_address(), Value::Object(recalled));
        }
        tracing::info!("Successfully recalled group scene {}", scene);
        return Ok(Some(ConvertOutcome {
            members_state: Some(members_state),
            ..ConvertOutcome::default()
        }));
    }

    match meta.store.scene(entity.id(), scene, group) {
        Some(snapshot) => {
            tracing::info!("Successfully recalled scene {} for {}", scene, entity.id());
            Ok(Some(ConvertOutcome::state(sync_color(annotate_color_mode(snapshot.state), entity, meta))))
        }
        None => {
            tracing::warn!("Unknown scene was recalled for {}, can't restore state.", entity.id());
            Ok(Some(ConvertOutcome::state(Map::new())))
        }
    }
}

/// Extension field sets of a `scene_add` request and the state they stand for
struct SceneContent {
    field_sets: Vec<Value>,
    state: Map<String, Value>,
}

fn field_set(cluster: u16, len: u8, fields: Value) -> Value {
    json!({ "clstId": cluster, "len": len, "extField": fields })
}

fn scaled_xy(xy: ColorXy) -> Value {
    json!([
        number_value(map_number_range(xy.x, 0.0, 1.0, 0.0, 65535.0)),
        number_value(map_number_range(xy.y, 0.0, 1.0, 0.0, 65535.0))
    ])
}

fn scene_content(entity: &Entity, request: &Map<String, Value>, meta: &Meta<'_>) -> Result<SceneContent, ConvertError> {
    let mut field_sets = Vec::new();
    let mut state = Map::new();

    for (attribute, value) in request {
        match attribute.as_str() {
            "state" => {
                let on = lookup_value(value, ON_OFF)?;
                field_sets.push(field_set(ON_OFF_CLUSTER, 1, json!([on])));
                state.insert("state".to_string(), json!(if on == 1 { "ON" } else { "OFF" }));
            }
            "brightness" => {
                let brightness = number_value(require_number_in(value, "brightness", 0.0, 254.0)?);
                field_sets.push(field_set(LEVEL_CLUSTER, 1, json!([brightness])));
                state.insert("brightness".to_string(), brightness);
            }
            "position" => {
                let position = require_number_in(value, "position", 0.0, 100.0)?;
                let sent = number_value(flip(position, invert_requested(entity, meta)));
                field_sets.push(field_set(WINDOW_COVERING_CLUSTER, 1, json!([sent])));
                state.insert("position".to_string(), value.clone());
            }
            "color_temp" => {
                // scene tables store color temperature as XY
                let requested = require_number(value, "color_temp")?;
                let mireds = find_color_temp_range(entity).clamp(requested);
                field_sets.push(field_set(COLOR_CLUSTER, 4, scaled_xy(ColorXy::from_mireds(mireds))));
                state.insert("color_mode".to_string(), json!(ColorMode::ColorTemp.as_str()));
                state.insert("color_temp".to_string(), number_value(mireds));
            }
            "color" => {
                let parsed = match value {
                    Value::String(raw) => serde_json::from_str(raw).unwrap_or_else(|_| value.clone()),
                    _ => value.clone(),
                };
                match Color::from_converter_arg(&parsed)? {
                    Color::Hsv(hsv) => {
                        let corrected = hsv.corrected(&meta.options.hue_correction);
                        let enhanced =
                            meta_value(entity, &meta.mapped, GroupStrategy::AllEqual, true, |m| m.supports_enhanced_hue);
                        if enhanced {
                            let hue = map_number_range(corrected.hue.unwrap_or_default(), 0.0, 360.0, 0.0, 65535.0);
                            let saturation =
                                map_number_range(corrected.saturation.unwrap_or_default(), 0.0, 100.0, 0.0, 254.0);
                            let fields = json!([0, 0, number_value(hue), number_value(saturation), 0, 0, 0, 0]);
                            field_sets.push(field_set(COLOR_CLUSTER, 13, fields));
                        } else {
                            // the field set always carries enhanced hue, so fall back to XY
                            field_sets.push(field_set(COLOR_CLUSTER, 4, scaled_xy(corrected.to_xy(gamut(meta)))));
                        }
                        state.insert("color_mode".to_string(), json!(ColorMode::Hs.as_str()));
                        state.insert("color".to_string(), Value::Object(hsv.to_object(false)));
                    }
                    Color::Rgb(rgb) => push_xy(&mut field_sets, &mut state, rgb.to_xy(gamut(meta)).rounded(4)),
                    Color::Xy(xy) => push_xy(&mut field_sets, &mut state, xy),
                }
            }
            _ => {}
        }
    }
    Ok(SceneContent { field_sets, state })
}

fn push_xy(field_sets: &mut Vec<Value>, state: &mut Map<String, Value>, xy: ColorXy) {
    field_sets.push(field_set(COLOR_CLUSTER, 4, scaled_xy(xy)));
    state.insert("color_mode".to_string(), json!(ColorMode::Xy.as_str()));
    state.insert("color".to_string(), Value::Object(xy.to_object()));
}

/// Whether a `remove` status leaves the slot free for a new `add`
fn remove_tolerated(status: u8) -> bool {
    matches!(
        Status::try_from(status),
        Ok(Status::Success | Status::InvalidField | Status::NotFound)
    )
}

/// Define a scene from explicit attributes instead of the live state
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub async fn add(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "scene_add")?;
    let scene = scene_id(request.get("ID").unwrap_or(&Value::Null))?;
    if request.get("color_temp").is_some_and(|v| !v.is_null()) && request.get("color").is_some_and(|v| !v.is_null()) {
        return Err(ValueError::Invalid("Don't specify both 'color_temp' and 'color'".to_string()).into());
    }
    let group = group_id(entity, Some(request))?;
    check_reserved(group, scene)?;

    let transition = match request.get("transition") {
        None | Some(Value::Null) => 0.0,
        Some(transition) => to_number(transition, "transition")?,
    };
    let content = scene_content(entity, request, meta)?;
    let options = zcl_options(&meta.mapped);

    // adding over an existing scene merges both, so clear the slot first
    let removed = entity
        .command(Cluster::SCENES, "remove", json!({ "groupid": group, "sceneid": scene }), &options)
        .await?;
    if !entity.is_group() && !remove_tolerated(removed.status) {
        return Err(ConvertError::SceneRemoveFailed(Status::describe(removed.status)));
    }

    let (command, transtime) = if transition.fract() == 0.0 {
        ("add", transition)
    } else {
        ("enhancedAdd", (transition * 10.0).floor())
    };
    let payload = json!({
        "groupid": group,
        "sceneid": scene,
        "scenename": "",
        "transtime": transtime as u16,
        "extensionfieldsets": content.field_sets,
    });
    let response = entity.command(Cluster::SCENES, command, payload, &options).await?;

    let name = scene_name(Some(request));
    if entity.is_group() {
        if meta.members_state.is_some() {
            for member in entity.members() {
                meta.store.save_scene(member.id(), scene, group, &content.state, name.clone());
            }
        }
    } else if response.status == 0 {
        meta.store.save_scene(entity.id(), scene, group, &content.state, name);
    } else {
        return Err(device_failure("Scene add", response.status));
    }
    tracing::info!("Successfully added scene {} (group {}) for {}", scene, group, entity.id());
    Ok(Some(ConvertOutcome::state(Map::new())))
}

pub async fn remove(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let scene = scene_id(value)?;
    let group = group_id(entity, None)?;
    let response = entity
        .command(
            Cluster::SCENES,
            "remove",
            json!({ "groupid": group, "sceneid": scene }),
            &zcl_options(&meta.mapped),
        )
        .await?;

    if entity.is_group() {
        if meta.members_state.is_some() {
            for member in entity.members() {
                meta.store.delete_scene(member.id(), scene, group);
            }
        }
    } else if response.status == 0 {
        meta.store.delete_scene(entity.id(), scene, group);
    } else {
        return Err(device_failure("Scene remove", response.status));
    }
    tracing::info!("Successfully removed scene {} (group {}) for {}", scene, group, entity.id());
    Ok(None)
}

pub async fn remove_all(entity: &Entity, meta: &Meta<'_>) -> SetResult {
    let group = group_id(entity, None)?;
    let response = entity
        .command(Cluster::SCENES, "removeAll", json!({ "groupid": group }), &zcl_options(&meta.mapped))
        .await?;

    if entity.is_group() {
        if meta.members_state.is_some() {
            for member in entity.members() {
                meta.store.delete_all_scenes(member.id());
            }
        }
    } else if response.status == 0 {
        meta.store.delete_all_scenes(entity.id());
    } else {
        return Err(device_failure("Scene remove all", response.status));
    }
    tracing::info!("Successfully removed all scenes for {}", entity.id());
    Ok(None)
}

/// Rename a stored scene; nothing is sent to the device
pub async fn rename(entity: &Entity, value: &Value, meta: &Meta<'_>) -> SetResult {
    let request = require_object(value, "scene_rename")?;
    let scene = scene_id(request.get("ID").unwrap_or(&Value::Null))?;
    let group = group_id(entity, Some(request))?;
    let name = scene_name(Some(request));

    if entity.is_group() {
        if meta.members_state.is_some() {
            for member in entity.members() {
                if let Some(snapshot) = meta.store.scene(member.id(), scene, group) {
                    meta.store.save_scene(member.id(), scene, group, &snapshot.state, name.clone());
                }
            }
        }
    } else {
        let snapshot = meta
            .store
            .scene(entity.id(), scene, group)
            .ok_or_else(|| ValueError::Invalid("No such scene in device meta data".to_string()))?;
        meta.store.save_scene(entity.id(), scene, group, &snapshot.state, name);
    }
    tracing::info!("Successfully renamed scene {} (group {}) for {}", scene, group, entity.id());
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Call, Context, MockLink};
    use std::sync::Arc;

    fn scene_commands(link: &MockLink) -> Vec<(String, Value)> {
        link.calls()
            .iter()
            .filter_map(Call::as_command)
            .map(|(command, payload)| (command.to_string(), payload.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_reserved_scene_rejected_before_sending() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let err = store(&entity, &json!(0), &ctx.meta()).await.unwrap_err();
        assert_eq!(err.to_string(), "Scene ID 0 cannot be used with group ID 0 (reserved).");
        let err = add(&entity, &json!({"ID": 0, "state": "ON"}), &ctx.meta()).await.unwrap_err();
        assert_eq!(err.to_string(), "Scene ID 0 cannot be used with group ID 0 (reserved).");
        assert!(link.calls().is_empty());

        store(&entity, &json!({"ID": 0, "group_id": 5}), &ctx.meta()).await.unwrap();
        assert_eq!(link.commands(), vec!["store"]);
    }

    #[tokio::test]
    async fn test_store_then_recall() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new().with_state(json!({"state": "ON", "brightness": 120, "color_temp": 300, "linkquality": 80}));

        let outcome = store(&entity, &json!({"ID": 3, "name": "Evening"}), &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(Map::new()));

        let snapshot = ctx.store.scene(entity.id(), 3, 0).unwrap();
        assert_eq!(snapshot.name.as_deref(), Some("Evening"));
        assert!(!snapshot.state.contains_key("linkquality"));

        let fresh = Context { store: ctx.store, ..Context::new() };
        let outcome = recall(&entity, &json!(3), &fresh.meta()).await.unwrap().unwrap();
        assert_eq!(
            outcome.state,
            Some(testing::object(
                json!({"state": "ON", "brightness": 120, "color_temp": 300, "color_mode": "color_temp"})
            ))
        );
        assert_eq!(scene_commands(&link)[1], ("recall".to_string(), json!({"groupid": 0, "sceneid": 3})));
    }

    #[tokio::test]
    async fn test_store_device_failure_keeps_snapshots() {
        let link = Arc::new(MockLink::default());
        link.set_command_status("store", 0x89);
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new().with_state(json!({"state": "ON"}));

        let err = store(&entity, &json!(4), &ctx.meta()).await.unwrap_err();
        assert!(matches!(err, ConvertError::DeviceStatus { operation: "Scene store", .. }));
        assert!(ctx.store.scene(entity.id(), 4, 0).is_none());
    }

    #[tokio::test]
    async fn test_recall_unknown_scene_is_empty() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let outcome = recall(&entity, &json!(9), &ctx.meta()).await.unwrap().unwrap();
        assert_eq!(outcome.state, Some(Map::new()));
    }

    #[tokio::test]
    async fn test_group_store_and_recall_per_member() {
        let link = Arc::new(MockLink::default());
        let group = testing::group(&link, 7, 2);
        let members = group.members().to_vec();
        let mut ctx = Context::new();
        let mut members_state = Map::new();
        members_state.insert(members[0].ieee_address(), json!({"state": "ON", "brightness": 10}));
        members_state.insert(members[1].ieee_address(), json!({"state": "OFF"}));
        ctx.members_state = Some(members_state);

        store(&group, &json!(1), &ctx.meta()).await.unwrap();
        assert_eq!(scene_commands(&link)[0].1, json!({"groupid": 7, "sceneid": 1}));

        ctx.store.delete_scene(members[1].id(), 1, 7);
        let outcome = recall(&group, &json!(1), &ctx.meta()).await.unwrap().unwrap();
        let members_state = outcome.members_state.unwrap();
        assert_eq!(members_state[&members[0].ieee_address()], json!({"state": "ON", "brightness": 10}));
        assert_eq!(members_state[&members[1].ieee_address()], json!({}));
    }

    #[tokio::test]
    async fn test_add_builds_field_sets() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let value = json!({"ID": 2, "state": "on", "brightness": 200, "position": 30, "transition": 1.5, "name": "Read"});
        add(&entity, &value, &ctx.meta()).await.unwrap();

        let commands = scene_commands(&link);
        assert_eq!(commands[0], ("remove".to_string(), json!({"groupid": 0, "sceneid": 2})));
        let (command, payload) = &commands[1];
        assert_eq!(command, "enhancedAdd");
        assert_eq!(payload["transtime"], json!(15));
        assert_eq!(
            payload["extensionfieldsets"],
            json!([
                {"clstId": 8, "len": 1, "extField": [200]},
                {"clstId": 258, "len": 1, "extField": [30]},
                {"clstId": 6, "len": 1, "extField": [1]},
            ])
        );

        let snapshot = ctx.store.scene(entity.id(), 2, 0).unwrap();
        assert_eq!(snapshot.state, testing::object(json!({"state": "ON", "brightness": 200, "position": 30})));
        assert_eq!(snapshot.name.as_deref(), Some("Read"));
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_attributes_before_sending() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        for value in [
            json!({"ID": 3, "state": 5}),
            json!({"ID": 3, "state": "dim"}),
            json!({"ID": 3, "brightness": 300}),
            json!({"ID": 3, "brightness": "full"}),
            json!({"ID": 3, "position": 120}),
            json!({"ID": 3, "group_id": 70000, "state": "ON"}),
        ] {
            assert!(add(&entity, &value, &ctx.meta()).await.is_err(), "{value}");
        }
        assert!(store(&entity, &json!({"ID": 3, "group_id": -1}), &ctx.meta()).await.is_err());
        assert!(link.calls().is_empty());
        assert!(ctx.store.scene(entity.id(), 3, 0).is_none());
    }

    #[tokio::test]
    async fn test_add_color_and_tolerated_remove_status() {
        let link = Arc::new(MockLink::default());
        link.set_command_status("remove", 0x8b);
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        add(&entity, &json!({"ID": 5, "color": "{\"x\": 0.5, \"y\": 0.25}"}), &ctx.meta()).await.unwrap();
        let (command, payload) = &scene_commands(&link)[1];
        assert_eq!(command, "add");
        assert_eq!(
            payload["extensionfieldsets"],
            json!([{"clstId": 768, "len": 4, "extField": [32768, 16384]}])
        );
        let snapshot = ctx.store.scene(entity.id(), 5, 0).unwrap();
        assert_eq!(snapshot.state["color_mode"], json!("xy"));

        let err = add(&entity, &json!({"ID": 5, "color": {"x": 0.1, "y": 0.1}, "color_temp": 300}), &ctx.meta())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Don't specify both 'color_temp' and 'color'");
    }

    #[tokio::test]
    async fn test_add_remove_failure() {
        let link = Arc::new(MockLink::default());
        link.set_command_status("remove", 0x01);
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new();

        let err = add(&entity, &json!({"ID": 5, "state": "ON"}), &ctx.meta()).await.unwrap_err();
        assert_eq!(err.to_string(), "Scene add unable to remove existing scene ('FAILURE')");
        assert_eq!(link.commands(), vec!["remove"]);
        assert!(ctx.store.scene(entity.id(), 5, 0).is_none());
    }

    #[tokio::test]
    async fn test_remove_rename_and_remove_all() {
        let link = Arc::new(MockLink::default());
        let entity = testing::endpoint(&link, 1);
        let ctx = Context::new().with_state(json!({"state": "ON"}));

        store(&entity, &json!(1), &ctx.meta()).await.unwrap();
        store(&entity, &json!(2), &ctx.meta()).await.unwrap();

        rename(&entity, &json!({"ID": 1, "name": "Night"}), &ctx.meta()).await.unwrap();
        assert_eq!(ctx.store.scene(entity.id(), 1, 0).unwrap().name.as_deref(), Some("Night"));
        let err = rename(&entity, &json!({"ID": 8, "name": "x"}), &ctx.meta()).await.unwrap_err();
        assert_eq!(err.to_string(), "No such scene in device meta data");

        remove(&entity, &json!(1), &ctx.meta()).await.unwrap();
        assert!(ctx.store.scene(entity.id(), 1, 0).is_none());
        assert!(ctx.store.scene(entity.id(), 2, 0).is_some());

        remove_all(&entity, &ctx.meta()).await.unwrap();
        assert!(ctx.store.scene(entity.id(), 2, 0).is_none());
        assert_eq!(link.commands(), vec!["store", "store", "remove", "removeAll"]);
    }
}
