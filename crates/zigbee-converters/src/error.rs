//! Error types for conversion and definition loading

use thiserror::Error;
use zcl_protocol::ZclError;
use zigbee_core::{ColorError, ValueError};

/// A set or get request could not be carried out
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The request value failed validation
    #[error(transparent)]
    Value(#[from] ValueError),

    /// The color argument could not be parsed
    #[error(transparent)]
    Color(#[from] ColorError),

    /// The ZCL request itself failed
    #[error("ZCL request failed: {0}")]
    Zcl(#[from] ZclError),

    /// The converter needs a single endpoint
    #[error("Not supported for groups")]
    NotSupportedForGroups,

    /// The device answered with a non-success status
    #[error("{operation} not successful ('{status}')")]
    DeviceStatus { operation: &'static str, status: String },

    /// `scene_add` could not clear the previous scene
    #[error("Scene add unable to remove existing scene ('{0}')")]
    SceneRemoveFailed(String),

    /// The converter or device cannot do what was asked
    #[error("{0}")]
    Unsupported(String),

    /// The converter has no get operation
    #[error("Converter '{0}' does not support get")]
    GetNotSupported(&'static str),
}

/// A definition could not be loaded; aborts the whole load
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Required field missing or empty
    #[error("Definition '{model}' is missing required field '{field}'")]
    MissingField { model: String, field: &'static str },

    /// A lifecycle hook was given more than once
    #[error("'{model}' has multiple '{hook}', this is not allowed")]
    HookCollision { model: String, hook: &'static str },

    /// Deriving exposes cannot be combined with extend
    #[error("'{model}' has function exposes which is not allowed")]
    DynamicExposesWithExtend { model: String },

    /// A fingerprint address pattern does not compile
    #[error("Invalid ieeeAddr pattern '{pattern}': {source}")]
    BadRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A catalog entry names a converter that does not exist
    #[error("Definition '{model}' references unknown converter '{name}'")]
    UnknownConverter { model: String, name: String },

    /// A catalog entry names a hook that does not exist
    #[error("Definition '{model}' references unknown {hook} '{name}'")]
    UnknownHook {
        model: String,
        hook: &'static str,
        name: String,
    },

    /// A catalog entry extends a model defined nowhere before it
    #[error("Definition '{model}' extends unknown model '{base}'")]
    UnknownExtend { model: String, base: String },

    /// IO error (catalog file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (catalog file)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
