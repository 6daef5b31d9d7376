//! Definition registry and device resolution
//!
//! Definitions are indexed by every fingerprint model id and every zigbee
//! model alias, lower-cased. The most recently added definition comes first
//! in every candidate list and in [`DefinitionRegistry::definitions`].

use std::collections::HashMap;
use std::sync::Arc;

use zigbee_core::DeviceDescriptor;

use crate::converter::Converter;
use crate::definition::{Definition, DefinitionSpec, Exposes};
use crate::error::RegistryError;
use crate::expose::{self, Expose};
use crate::extend::compose;

/// Converters every definition gets after its own
pub const UNIVERSAL_CONVERTERS: [Converter; 10] = [
    Converter::SceneStore,
    Converter::SceneRecall,
    Converter::SceneAdd,
    Converter::SceneRemove,
    Converter::SceneRemoveAll,
    Converter::SceneRename,
    Converter::Read,
    Converter::Write,
    Converter::Command,
    Converter::FactoryReset,
];

/// All loaded definitions and the model lookup index
#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: Vec<Arc<Definition>>,
    lookup: HashMap<String, Vec<Arc<Definition>>>,
}

fn required(value: Option<String>, model: &str, field: &'static str) -> Result<String, RegistryError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RegistryError::MissingField {
            model: model.to_string(),
            field,
        }),
    }
}

pub(crate) fn finalize(spec: &DefinitionSpec) -> Result<Definition, RegistryError> {
    let composed = compose(spec)?;
    let name = composed.model_name().to_string();

    let model = required(composed.model, &name, "model")?;
    let vendor = required(composed.vendor, &name, "vendor")?;
    let description = required(composed.description, &name, "description")?;

    let from_zigbee = composed.from_zigbee.unwrap_or_default();
    if from_zigbee.is_empty() {
        return Err(RegistryError::MissingField { model, field: "fromZigbee" });
    }

    let mut to_zigbee = composed.to_zigbee.unwrap_or_default();
    if to_zigbee.is_empty() {
        return Err(RegistryError::MissingField { model, field: "toZigbee" });
    }
    for converter in UNIVERSAL_CONVERTERS {
        if !to_zigbee.contains(&converter) {
            to_zigbee.push(converter);
        }
    }

    let exposes = match composed.exposes {
        None => return Err(RegistryError::MissingField { model, field: "exposes" }),
        Some(Exposes::Static(mut list)) => {
            if !list.iter().any(|e| e.name() == Some("linkquality")) {
                list.push(expose::linkquality());
            }
            Exposes::Static(list)
        }
        Some(dynamic) => dynamic,
    };

    let mut options: Vec<Expose> = composed.options.unwrap_or_default();
    for converter in &to_zigbee {
        for option in converter.options() {
            if !options.iter().any(|o| o.name() == option.name()) {
                options.push(option);
            }
        }
    }

    let mut fingerprint = composed.fingerprint.unwrap_or_default();
    for fp in &mut fingerprint {
        fp.compile()?;
    }
    let mut white_label = composed.white_label.unwrap_or_default();
    for fp in white_label.iter_mut().filter_map(|w| w.fingerprint.as_mut()).flatten() {
        fp.compile()?;
    }

    let mut definition = Definition {
        model,
        vendor,
        description,
        zigbee_model: composed.zigbee_model.unwrap_or_default(),
        fingerprint,
        white_label,
        from_zigbee,
        to_zigbee,
        exposes,
        options,
        meta: composed.meta.unwrap_or_default(),
        configure: composed.configure,
        on_event: composed.on_event,
        ota: composed.ota,
        key_index: HashMap::new(),
    };
    definition.index_keys();
    Ok(definition)
}

impl DefinitionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a catalog; any invalid definition aborts the load
    pub fn load<I>(specs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = DefinitionSpec>,
    {
        let mut registry = Self::new();
        for spec in specs {
            registry.add(&spec)?;
        }
        tracing::info!(
            "Loaded {} device definitions ({} model strings)",
            registry.definitions.len(),
            registry.lookup.len()
        );
        Ok(registry)
    }

    /// Compose, validate and index one definition
    pub fn add(&mut self, spec: &DefinitionSpec) -> Result<Arc<Definition>, RegistryError> {
        let definition = Arc::new(finalize(spec)?);
        self.definitions.insert(0, definition.clone());

        let models = definition
            .fingerprint
            .iter()
            .filter_map(|fp| fp.model_id.clone())
            .chain(definition.zigbee_model.iter().cloned())
            .collect::<Vec<_>>();
        for model in models {
            let candidates = self.lookup.entry(model.to_lowercase()).or_default();
            if !candidates.iter().any(|c| Arc::ptr_eq(c, &definition)) {
                candidates.insert(0, definition.clone());
            }
        }
        tracing::debug!("Added definition '{}' ({})", definition.model, definition.vendor);
        Ok(definition)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Every definition, most recently added first
    #[must_use]
    pub fn definitions(&self) -> &[Arc<Definition>] {
        &self.definitions
    }

    /// Candidates for a model string; a miss is retried with everything from
    /// the first NUL terminator stripped
    #[must_use]
    pub fn candidates(&self, model: &str) -> Option<&[Arc<Definition>]> {
        if let Some(candidates) = self.lookup.get(&model.to_lowercase()) {
            return Some(candidates);
        }
        let terminated = model.find('\0').map_or(model, |end| &model[..end]);
        self.lookup
            .get(&terminated.trim().to_lowercase())
            .map(Vec::as_slice)
    }

    /// Definition for a bare model string: the earliest added candidate
    #[must_use]
    pub fn resolve(&self, model: &str) -> Option<Arc<Definition>> {
        if model.is_empty() {
            return None;
        }
        self.candidates(model)?.last().cloned()
    }

    /// Legacy name for [`resolve`](Self::resolve); prefer [`find_by_device`](Self::find_by_device)
    #[must_use]
    pub fn find_by_zigbee_model(&self, model: &str) -> Option<Arc<Definition>> {
        self.resolve(model)
    }

    /// Definition for a device, disambiguating candidates by fingerprint
    #[must_use]
    pub fn resolve_device(&self, device: &DeviceDescriptor) -> Option<Arc<Definition>> {
        let model_id = device.model_id.as_deref()?;
        let candidates = self.candidates(model_id)?;

        if let [only] = candidates {
            if !only.zigbee_model.is_empty() {
                return Some(only.clone());
            }
        }

        let mut best: Option<(i32, &Arc<Definition>)> = None;
        for candidate in candidates {
            for fingerprint in &candidate.fingerprint {
                let priority = fingerprint.priority();
                let better = best.map_or(true, |(current, _)| priority > current);
                if better && fingerprint.matches(device) {
                    best = Some((priority, candidate));
                }
            }
        }
        if let Some((_, definition)) = best {
            return Some(definition.clone());
        }

        candidates
            .iter()
            .find(|c| c.zigbee_model.iter().any(|m| m == model_id))
            .cloned()
    }

    /// Swap in a white label identity whose fingerprint matches the device.
    ///
    /// Returns a copy; the registered definition never changes.
    #[must_use]
    pub fn apply_white_label(definition: &Arc<Definition>, device: &DeviceDescriptor) -> Arc<Definition> {
        let matched = definition.white_label.iter().find(|label| {
            label
                .fingerprint
                .as_ref()
                .is_some_and(|fps| fps.iter().any(|fp| fp.matches(device)))
        });
        match matched {
            Some(label) => Arc::new(Definition {
                model: label.model.clone(),
                vendor: label.vendor.clone(),
                description: label
                    .description
                    .clone()
                    .unwrap_or_else(|| definition.description.clone()),
                ..(**definition).clone()
            }),
            None => definition.clone(),
        }
    }

    /// [`resolve_device`](Self::resolve_device) followed by white label selection
    #[must_use]
    pub fn find_by_device(&self, device: &DeviceDescriptor) -> Option<Arc<Definition>> {
        self.resolve_device(device)
            .map(|definition| Self::apply_white_label(&definition, device))
    }

    /// Definition whose model (or a white label model) equals `name`, ignoring case
    #[must_use]
    pub fn find_by_model_name(&self, name: &str) -> Option<Arc<Definition>> {
        let name = name.to_lowercase();
        self.definitions
            .iter()
            .find(|definition| {
                definition.model.to_lowercase() == name
                    || definition
                        .white_label
                        .iter()
                        .any(|label| label.model.to_lowercase() == name)
            })
            .cloned()
    }
}
