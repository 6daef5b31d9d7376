//! Per-entity key/value store and scene snapshots
//!
//! Transient values live only as long as the process; scene snapshots can be
//! exported for persistence (see [`crate::persistence`]).

use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::EntityId;

/// State keys a scene snapshot keeps
pub const SCENE_ATTRIBUTES: [&str; 6] = ["state", "brightness", "color", "color_temp", "color_mode", "position"];

/// Captured state of one scene on one endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub state: Map<String, Value>,
}

/// A scene snapshot together with its key, as exported for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRecord {
    pub entity: EntityId,
    pub scene_id: u8,
    pub group_id: u16,
    #[serde(flatten)]
    pub snapshot: SceneSnapshot,
}

/// Process-wide cache keyed by entity identity
#[derive(Debug, Default)]
pub struct EntityStore {
    values: DashMap<EntityId, HashMap<String, Value>>,
    scenes: DashMap<EntityId, HashMap<(u8, u16), SceneSnapshot>>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, entity: EntityId, key: &str, value: Value) {
        self.values.entry(entity).or_default().insert(key.to_string(), value);
    }

    #[must_use]
    pub fn get(&self, entity: EntityId, key: &str) -> Option<Value> {
        self.values.get(&entity).and_then(|values| values.get(key).cloned())
    }

    /// Value for `key`, or `default` when nothing was stored
    #[must_use]
    pub fn get_or(&self, entity: EntityId, key: &str, default: Value) -> Value {
        self.get(entity, key).unwrap_or(default)
    }

    #[must_use]
    pub fn has(&self, entity: EntityId, key: &str) -> bool {
        self.values.get(&entity).is_some_and(|values| values.contains_key(key))
    }

    /// Read-modify-write one key while holding the entity's shard lock
    pub fn update<F>(&self, entity: EntityId, key: &str, f: F) -> Option<Value>
    where
        F: FnOnce(Option<&Value>) -> Option<Value>,
    {
        let mut values = self.values.entry(entity).or_default();
        let next = f(values.get(key));
        match &next {
            Some(value) => {
                values.insert(key.to_string(), value.clone());
            }
            None => {
                values.remove(key);
            }
        }
        next
    }

    pub fn clear(&self, entity: EntityId, key: &str) {
        if let Some(mut values) = self.values.get_mut(&entity) {
            values.remove(key);
        }
    }

    /// Drop every transient value of one entity
    pub fn clear_entity(&self, entity: EntityId) {
        self.values.remove(&entity);
    }

    pub fn clear_all(&self) {
        self.values.clear();
    }

    /// Store a scene snapshot, keeping only the scene attributes of `state`
    pub fn save_scene(
        &self,
        entity: EntityId,
        scene_id: u8,
        group_id: u16,
        state: &Map<String, Value>,
        name: Option<String>,
    ) {
        let state = state
            .iter()
            .filter(|(key, _)| SCENE_ATTRIBUTES.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.scenes
            .entry(entity)
            .or_default()
            .insert((scene_id, group_id), SceneSnapshot { name, state });
    }

    #[must_use]
    pub fn scene(&self, entity: EntityId, scene_id: u8, group_id: u16) -> Option<SceneSnapshot> {
        self.scenes
            .get(&entity)
            .and_then(|scenes| scenes.get(&(scene_id, group_id)).cloned())
    }

    /// Remove one scene; returns whether it existed
    pub fn delete_scene(&self, entity: EntityId, scene_id: u8, group_id: u16) -> bool {
        self.scenes
            .get_mut(&entity)
            .is_some_and(|mut scenes| scenes.remove(&(scene_id, group_id)).is_some())
    }

    pub fn delete_all_scenes(&self, entity: EntityId) {
        self.scenes.remove(&entity);
    }

    /// Every stored scene, ordered for stable output
    #[must_use]
    pub fn export_scenes(&self) -> Vec<SceneRecord> {
        let mut records: Vec<SceneRecord> = self
            .scenes
            .iter()
            .flat_map(|entry| {
                let entity = *entry.key();
                entry
                    .value()
                    .iter()
                    .map(|(&(scene_id, group_id), snapshot)| SceneRecord {
                        entity,
                        scene_id,
                        group_id,
                        snapshot: snapshot.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        records.sort_by_key(|r| (r.entity.to_string(), r.group_id, r.scene_id));
        records
    }

    /// Replace stored scenes with previously exported records
    pub fn import_scenes(&self, records: Vec<SceneRecord>) {
        self.scenes.clear();
        for record in records {
            self.scenes
                .entry(record.entity)
                .or_default()
                .insert((record.scene_id, record.group_id), record.snapshot);
        }
    }
}
