//! Error types for value validation and color parsing

use thiserror::Error;

/// A value supplied by the caller failed validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// Value not among the allowed options
    #[error("'{value}' not allowed, choose between: {allowed}")]
    NotAllowed { value: String, allowed: String },

    /// Lookup table has no entry for the value
    #[error("Value '{value}' is not allowed, expected one of {allowed}")]
    NotInLookup { value: String, allowed: String },

    /// Value has the wrong JSON type
    #[error("'{key}' is not a {expected}, got {got}")]
    WrongType {
        key: String,
        expected: &'static str,
        got: String,
    },

    /// Numeric value outside its range
    #[error("'{key}' needs to be within {min} and {max}, got {value}")]
    OutOfRange {
        key: String,
        min: f64,
        max: f64,
        value: f64,
    },

    /// A composite value lacks a required field
    #[error("'{0}' is missing")]
    MissingField(String),

    /// Anything else that makes the value unusable
    #[error("{0}")]
    Invalid(String),
}

/// A color argument could not be interpreted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    /// None of the supported color notations matched
    #[error("Value does not contain valid color definition")]
    NoColorDefinition,

    /// A hex string could not be parsed
    #[error("Invalid hex color '{0}'")]
    InvalidHex(String),

    /// A comma separated triple could not be parsed
    #[error("Invalid color triple '{0}'")]
    InvalidTriple(String),
}
