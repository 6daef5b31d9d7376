//! Definition composition
//!
//! Resolves `extend` into a flat [`DefinitionSpec`]. Legacy extend treats the
//! base as defaults that the spec's own fields replace; modern extend appends
//! each module's converters and exposes after the spec's own. Meta is merged
//! in both cases with the spec winning. Lifecycle hooks may be given once.

use std::sync::Arc;

use crate::definition::{DefinitionMeta, DefinitionSpec, Exposes, Extend, ModernExtend};
use crate::error::RegistryError;

/// Flatten `spec`'s extend chain into a new spec; the input is left untouched
pub fn compose(spec: &DefinitionSpec) -> Result<DefinitionSpec, RegistryError> {
    match &spec.extend {
        None => Ok(spec.clone()),
        Some(Extend::Legacy(base)) => compose_legacy(base, spec),
        Some(Extend::Modern(modules)) => compose_modern(modules, spec),
    }
}

fn merge_meta(base: Option<&DefinitionMeta>, over: Option<&DefinitionMeta>) -> Option<DefinitionMeta> {
    match (base, over) {
        (None, None) => None,
        (Some(base), None) => Some(base.clone()),
        (None, Some(over)) => Some(over.clone()),
        (Some(base), Some(over)) => Some(base.merge(over)),
    }
}

/// Take the single hook out of two candidates, rejecting a second one
fn single_hook<T: ?Sized>(
    model: &str,
    hook: &'static str,
    current: Option<Arc<T>>,
    next: Option<&Arc<T>>,
) -> Result<Option<Arc<T>>, RegistryError> {
    match (current, next) {
        (Some(_), Some(_)) => Err(RegistryError::HookCollision {
            model: model.to_string(),
            hook,
        }),
        (current, next) => Ok(current.or_else(|| next.cloned())),
    }
}

fn single_ota(model: &str, current: Option<String>, next: Option<&String>) -> Result<Option<String>, RegistryError> {
    match (current, next) {
        (Some(_), Some(_)) => Err(RegistryError::HookCollision {
            model: model.to_string(),
            hook: "ota",
        }),
        (current, next) => Ok(current.or_else(|| next.cloned())),
    }
}

fn compose_legacy(base: &DefinitionSpec, spec: &DefinitionSpec) -> Result<DefinitionSpec, RegistryError> {
    let base = compose(base)?;
    let model = spec.model_name();

    let configure = single_hook(model, "configure", base.configure.clone(), spec.configure.as_ref())?;
    let on_event = single_hook(model, "onEvent", base.on_event.clone(), spec.on_event.as_ref())?;
    let ota = single_ota(model, base.ota.clone(), spec.ota.as_ref())?;
    if spec.exposes.as_ref().is_some_and(Exposes::is_dynamic) {
        return Err(RegistryError::DynamicExposesWithExtend { model: model.to_string() });
    }

    Ok(DefinitionSpec {
        model: spec.model.clone().or(base.model),
        vendor: spec.vendor.clone().or(base.vendor),
        description: spec.description.clone().or(base.description),
        zigbee_model: spec.zigbee_model.clone().or(base.zigbee_model),
        fingerprint: spec.fingerprint.clone().or(base.fingerprint),
        white_label: spec.white_label.clone().or(base.white_label),
        from_zigbee: spec.from_zigbee.clone().or(base.from_zigbee),
        to_zigbee: spec.to_zigbee.clone().or(base.to_zigbee),
        exposes: spec.exposes.clone().or(base.exposes),
        options: spec.options.clone().or(base.options),
        meta: merge_meta(base.meta.as_ref(), spec.meta.as_ref()),
        configure,
        on_event,
        ota,
        extend: None,
    })
}

fn compose_modern(modules: &[ModernExtend], spec: &DefinitionSpec) -> Result<DefinitionSpec, RegistryError> {
    let model = spec.model_name();
    let mut exposes = match &spec.exposes {
        Some(Exposes::Dynamic(_)) => {
            return Err(RegistryError::DynamicExposesWithExtend { model: model.to_string() });
        }
        Some(Exposes::Static(list)) => list.clone(),
        None => Vec::new(),
    };
    let mut to_zigbee = spec.to_zigbee.clone().unwrap_or_default();
    let mut from_zigbee = spec.from_zigbee.clone().unwrap_or_default();
    let mut meta = spec.meta.clone();
    let mut configure = spec.configure.clone();
    let mut on_event = spec.on_event.clone();
    let mut ota = spec.ota.clone();

    for module in modules {
        to_zigbee.extend(module.to_zigbee.iter().copied());
        from_zigbee.extend(module.from_zigbee.iter().cloned());
        exposes.extend(module.exposes.iter().cloned());
        meta = merge_meta(module.meta.as_ref(), meta.as_ref());
        configure = single_hook(model, "configure", configure, module.configure.as_ref())?;
        on_event = single_hook(model, "onEvent", on_event, module.on_event.as_ref())?;
        ota = single_ota(model, ota, module.ota.as_ref())?;
    }

    Ok(DefinitionSpec {
        to_zigbee: Some(to_zigbee),
        from_zigbee: Some(from_zigbee),
        exposes: Some(Exposes::Static(exposes)),
        meta,
        configure,
        on_event,
        ota,
        extend: None,
        ..spec.clone()
    })
}
