//! Device definitions
//!
//! A [`DefinitionSpec`] is what a catalog author writes: every field
//! optional, possibly extending another spec. The registry composes and
//! validates it into an immutable [`Definition`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use zigbee_core::{DeviceDescriptor, Gamut};

use crate::converter::Converter;
use crate::expose::Expose;
use crate::fingerprint::Fingerprint;
use crate::hooks::{Configure, OnEvent};
use crate::options::DeviceOptions;

/// Behavior flags of a device family, consulted by converters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefinitionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_default_response: Option<bool>,
    /// Response timeout in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_hue_and_saturation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_enhanced_hue: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_red_fix: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turns_off_at_brightness1: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_to_level_with_on_off_disable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_off_transition_when_off: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_inverted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_position_tilt_disable_report: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_code_count: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multi_endpoint: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DefinitionMeta {
    /// Overlay `over` on `self`; flags set in `over` win
    #[must_use]
    pub fn merge(&self, over: &DefinitionMeta) -> DefinitionMeta {
        let mut extra = self.extra.clone();
        extra.extend(over.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        DefinitionMeta {
            disable_default_response: over.disable_default_response.or(self.disable_default_response),
            timeout: over.timeout.or(self.timeout),
            supports_hue_and_saturation: over.supports_hue_and_saturation.or(self.supports_hue_and_saturation),
            supports_enhanced_hue: over.supports_enhanced_hue.or(self.supports_enhanced_hue),
            apply_red_fix: over.apply_red_fix.or(self.apply_red_fix),
            turns_off_at_brightness1: over.turns_off_at_brightness1.or(self.turns_off_at_brightness1),
            move_to_level_with_on_off_disable: over
                .move_to_level_with_on_off_disable
                .or(self.move_to_level_with_on_off_disable),
            no_off_transition_when_off: over.no_off_transition_when_off.or(self.no_off_transition_when_off),
            cover_inverted: over.cover_inverted.or(self.cover_inverted),
            cover_position_tilt_disable_report: over
                .cover_position_tilt_disable_report
                .or(self.cover_position_tilt_disable_report),
            pin_code_count: over.pin_code_count.or(self.pin_code_count),
            multi_endpoint: over.multi_endpoint.or(self.multi_endpoint),
            extra,
        }
    }
}

/// Alternate identity of a rebranded device
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhiteLabel {
    pub vendor: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When set, the identity applies only to devices matching one of these
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Vec<Fingerprint>>,
}

/// Derives exposes from the concrete device and its options
pub type ExposesFn = Arc<dyn Fn(Option<&DeviceDescriptor>, &DeviceOptions) -> Vec<Expose> + Send + Sync>;

#[derive(Clone)]
pub enum Exposes {
    Static(Vec<Expose>),
    Dynamic(ExposesFn),
}

impl Exposes {
    #[must_use]
    pub fn resolve(&self, device: Option<&DeviceDescriptor>, options: &DeviceOptions) -> Vec<Expose> {
        match self {
            Exposes::Static(list) => list.clone(),
            Exposes::Dynamic(derive) => derive(device, options),
        }
    }

    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Exposes::Dynamic(_))
    }
}

impl Default for Exposes {
    fn default() -> Self {
        Exposes::Static(Vec::new())
    }
}

impl fmt::Debug for Exposes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposes::Static(list) => f.debug_tuple("Static").field(list).finish(),
            Exposes::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A fragment contributed by a modern extend module
#[derive(Debug, Clone, Default)]
pub struct ModernExtend {
    pub to_zigbee: Vec<Converter>,
    pub from_zigbee: Vec<String>,
    pub exposes: Vec<Expose>,
    pub meta: Option<DefinitionMeta>,
    pub configure: Option<Arc<dyn Configure>>,
    pub on_event: Option<Arc<dyn OnEvent>>,
    pub ota: Option<String>,
}

/// Base a spec builds on
#[derive(Debug, Clone)]
pub enum Extend {
    /// A base spec whose fields act as defaults
    Legacy(Box<DefinitionSpec>),
    /// Modules whose lists are appended after the spec's own
    Modern(Vec<ModernExtend>),
}

/// Definition as authored, before composition and validation
#[derive(Debug, Clone, Default)]
pub struct DefinitionSpec {
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub zigbee_model: Option<Vec<String>>,
    pub fingerprint: Option<Vec<Fingerprint>>,
    pub white_label: Option<Vec<WhiteLabel>>,
    pub from_zigbee: Option<Vec<String>>,
    pub to_zigbee: Option<Vec<Converter>>,
    pub exposes: Option<Exposes>,
    pub options: Option<Vec<Expose>>,
    pub meta: Option<DefinitionMeta>,
    pub configure: Option<Arc<dyn Configure>>,
    pub on_event: Option<Arc<dyn OnEvent>>,
    pub ota: Option<String>,
    pub extend: Option<Extend>,
}

impl DefinitionSpec {
    #[must_use]
    pub fn new(model: &str, vendor: &str, description: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            vendor: Some(vendor.to_string()),
            description: Some(description.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_zigbee_model(mut self, models: &[&str]) -> Self {
        self.zigbee_model = Some(models.iter().map(ToString::to_string).collect());
        self
    }

    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: Vec<Fingerprint>) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    #[must_use]
    pub fn with_white_label(mut self, white_label: Vec<WhiteLabel>) -> Self {
        self.white_label = Some(white_label);
        self
    }

    #[must_use]
    pub fn with_from_zigbee(mut self, decoders: &[&str]) -> Self {
        self.from_zigbee = Some(decoders.iter().map(ToString::to_string).collect());
        self
    }

    #[must_use]
    pub fn with_to_zigbee(mut self, converters: &[Converter]) -> Self {
        self.to_zigbee = Some(converters.to_vec());
        self
    }

    #[must_use]
    pub fn with_exposes(mut self, exposes: Vec<Expose>) -> Self {
        self.exposes = Some(Exposes::Static(exposes));
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: DefinitionMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    #[must_use]
    pub fn with_configure(mut self, configure: Arc<dyn Configure>) -> Self {
        self.configure = Some(configure);
        self
    }

    #[must_use]
    pub fn with_extend(mut self, extend: Extend) -> Self {
        self.extend = Some(extend);
        self
    }

    /// Model name for error messages
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or("<unnamed>")
    }
}

/// A validated, immutable device definition
#[derive(Debug, Clone)]
pub struct Definition {
    pub model: String,
    pub vendor: String,
    pub description: String,
    pub zigbee_model: Vec<String>,
    pub fingerprint: Vec<Fingerprint>,
    pub white_label: Vec<WhiteLabel>,
    pub from_zigbee: Vec<String>,
    pub to_zigbee: Vec<Converter>,
    pub exposes: Exposes,
    pub options: Vec<Expose>,
    pub meta: DefinitionMeta,
    pub configure: Option<Arc<dyn Configure>>,
    pub on_event: Option<Arc<dyn OnEvent>>,
    pub ota: Option<String>,
    pub(crate) key_index: HashMap<String, Converter>,
}

impl Definition {
    /// The converter handling `key`: the first in `to_zigbee` claiming it
    #[must_use]
    pub fn converter_for(&self, key: &str) -> Option<Converter> {
        self.key_index.get(key).copied()
    }

    #[must_use]
    pub fn exposes_for(&self, device: Option<&DeviceDescriptor>, options: &DeviceOptions) -> Vec<Expose> {
        self.exposes.resolve(device, options)
    }

    /// Color gamut of the lights this definition describes
    #[must_use]
    pub fn gamut(&self) -> &'static Gamut {
        Gamut::for_device(&self.vendor, &self.description)
    }

    pub(crate) fn index_keys(&mut self) {
        let mut index = HashMap::new();
        for converter in &self.to_zigbee {
            for key in converter.keys() {
                index.entry((*key).to_string()).or_insert(*converter);
            }
        }
        self.key_index = index;
    }
}
