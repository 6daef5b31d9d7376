//! Device catalog stored as JSON
//!
//! Entries name their converters and hooks instead of carrying code, so a
//! catalog can live outside the binary. `extend` refers to the model of an
//! entry earlier in the same file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::converter::Converter;
use crate::definition::{DefinitionMeta, DefinitionSpec, Exposes, Extend, WhiteLabel};
use crate::error::RegistryError;
use crate::expose::Expose;
use crate::fingerprint::Fingerprint;
use crate::hooks::{Configure, ForgetOnStop, LightConfigure, OnEvent};
use crate::registry::DefinitionRegistry;

/// One definition as written in a catalog file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogEntry {
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub zigbee_model: Option<Vec<String>>,
    pub fingerprint: Option<Vec<Fingerprint>>,
    pub white_label: Option<Vec<WhiteLabel>>,
    pub from_zigbee: Option<Vec<String>>,
    /// Converter names, see [`Converter::name`]
    pub to_zigbee: Option<Vec<String>>,
    pub exposes: Option<Vec<Expose>>,
    pub meta: Option<DefinitionMeta>,
    /// `light` or `light_color_temp_range`
    pub configure: Option<String>,
    /// `forget_on_stop`
    pub on_event: Option<String>,
    pub ota: Option<String>,
    /// Model of an earlier entry this one builds on
    pub extend: Option<String>,
}

fn configure_hook(model: &str, name: &str) -> Result<Arc<dyn Configure>, RegistryError> {
    match name {
        "light" => Ok(Arc::new(LightConfigure::default())),
        "light_color_temp_range" => Ok(Arc::new(LightConfigure { read_color_temp_range: true })),
        _ => Err(RegistryError::UnknownHook {
            model: model.to_string(),
            hook: "configure",
            name: name.to_string(),
        }),
    }
}

fn event_hook(model: &str, name: &str) -> Result<Arc<dyn OnEvent>, RegistryError> {
    match name {
        "forget_on_stop" => Ok(Arc::new(ForgetOnStop)),
        _ => Err(RegistryError::UnknownHook {
            model: model.to_string(),
            hook: "onEvent",
            name: name.to_string(),
        }),
    }
}

impl CatalogEntry {
    /// Resolve names into a spec; `bases` holds the specs of earlier entries by model
    pub fn to_spec(&self, bases: &HashMap<String, DefinitionSpec>) -> Result<DefinitionSpec, RegistryError> {
        let model = self.model.as_deref().unwrap_or("<unnamed>");

        let to_zigbee = self
            .to_zigbee
            .as_ref()
            .map(|names| {
                names
                    .iter()
                    .map(|name| {
                        Converter::from_name(name).ok_or_else(|| RegistryError::UnknownConverter {
                            model: model.to_string(),
                            name: name.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        let extend = match &self.extend {
            Some(base) => {
                let spec = bases.get(base).ok_or_else(|| RegistryError::UnknownExtend {
                    model: model.to_string(),
                    base: base.clone(),
                })?;
                Some(Extend::Legacy(Box::new(spec.clone())))
            }
            None => None,
        };

        Ok(DefinitionSpec {
            model: self.model.clone(),
            vendor: self.vendor.clone(),
            description: self.description.clone(),
            zigbee_model: self.zigbee_model.clone(),
            fingerprint: self.fingerprint.clone(),
            white_label: self.white_label.clone(),
            from_zigbee: self.from_zigbee.clone(),
            to_zigbee,
            exposes: self.exposes.clone().map(Exposes::Static),
            options: None,
            meta: self.meta.clone(),
            configure: self.configure.as_deref().map(|n| configure_hook(model, n)).transpose()?,
            on_event: self.on_event.as_deref().map(|n| event_hook(model, n)).transpose()?,
            ota: self.ota.clone(),
            extend,
        })
    }
}

/// Parse catalog JSON (an array of entries) into definition specs
pub fn parse_catalog(json: &str) -> Result<Vec<DefinitionSpec>, RegistryError> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(json)?;
    let mut bases = HashMap::new();
    let mut specs = Vec::with_capacity(entries.len());
    for entry in &entries {
        let spec = entry.to_spec(&bases)?;
        if let Some(model) = &entry.model {
            bases.insert(model.clone(), spec.clone());
        }
        specs.push(spec);
    }
    Ok(specs)
}

/// Read a catalog file and build the registry from it
pub async fn load_catalog(path: &Path) -> Result<DefinitionRegistry, RegistryError> {
    let contents = fs::read_to_string(path).await?;
    let specs = parse_catalog(&contents)?;
    tracing::info!("Read {} catalog entries from {:?}", specs.len(), path);
    DefinitionRegistry::load(specs)
}
