//! Common types used throughout the ZCL layer

use std::fmt;

use thiserror::Error;

/// Errors surfaced by a ZCL request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ZclError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Status '{0}'")]
    Status(Status),

    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("Unsupported attribute '{attribute}' on cluster '{cluster}'")]
    UnsupportedAttribute { cluster: String, attribute: String },
}

impl ZclError {
    /// Status carried by the error, if the device answered at all
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            ZclError::Status(status) => Some(*status),
            _ => None,
        }
    }
}

/// ZCL status codes returned in default responses and command responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    Failure = 0x01,
    NotAuthorized = 0x7e,
    ReservedFieldNotZero = 0x7f,
    MalformedCommand = 0x80,
    UnsupClusterCommand = 0x81,
    UnsupGeneralCommand = 0x82,
    UnsupManufClusterCommand = 0x83,
    UnsupManufGeneralCommand = 0x84,
    InvalidField = 0x85,
    UnsupportedAttribute = 0x86,
    InvalidValue = 0x87,
    ReadOnly = 0x88,
    InsufficientSpace = 0x89,
    DuplicateExists = 0x8a,
    NotFound = 0x8b,
    UnreportableAttribute = 0x8c,
    InvalidDataType = 0x8d,
    InvalidSelector = 0x8e,
    WriteOnly = 0x8f,
    InconsistentStartupState = 0x90,
    DefinedOutOfBand = 0x91,
    Inconsistent = 0x92,
    ActionDenied = 0x93,
    Timeout = 0x94,
    Abort = 0x95,
    InvalidImage = 0x96,
    WaitForData = 0x97,
    NoImageAvailable = 0x98,
    RequireMoreImage = 0x99,
    NotificationPending = 0x9a,
    HardwareFailure = 0xc0,
    SoftwareFailure = 0xc1,
    CalibrationError = 0xc2,
    UnsupportedCluster = 0xc3,
}

impl Status {
    const ALL: [Status; 35] = [
        Status::Success,
        Status::Failure,
        Status::NotAuthorized,
        Status::ReservedFieldNotZero,
        Status::MalformedCommand,
        Status::UnsupClusterCommand,
        Status::UnsupGeneralCommand,
        Status::UnsupManufClusterCommand,
        Status::UnsupManufGeneralCommand,
        Status::InvalidField,
        Status::UnsupportedAttribute,
        Status::InvalidValue,
        Status::ReadOnly,
        Status::InsufficientSpace,
        Status::DuplicateExists,
        Status::NotFound,
        Status::UnreportableAttribute,
        Status::InvalidDataType,
        Status::InvalidSelector,
        Status::WriteOnly,
        Status::InconsistentStartupState,
        Status::DefinedOutOfBand,
        Status::Inconsistent,
        Status::ActionDenied,
        Status::Timeout,
        Status::Abort,
        Status::InvalidImage,
        Status::WaitForData,
        Status::NoImageAvailable,
        Status::RequireMoreImage,
        Status::NotificationPending,
        Status::HardwareFailure,
        Status::SoftwareFailure,
        Status::CalibrationError,
        Status::UnsupportedCluster,
    ];

    /// Wire name as it appears in device logs, e.g. `UNSUPPORTED_ATTRIBUTE`
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
            Status::NotAuthorized => "NOT_AUTHORIZED",
            Status::ReservedFieldNotZero => "RESERVED_FIELD_NOT_ZERO",
            Status::MalformedCommand => "MALFORMED_COMMAND",
            Status::UnsupClusterCommand => "UNSUP_CLUSTER_COMMAND",
            Status::UnsupGeneralCommand => "UNSUP_GENERAL_COMMAND",
            Status::UnsupManufClusterCommand => "UNSUP_MANUF_CLUSTER_COMMAND",
            Status::UnsupManufGeneralCommand => "UNSUP_MANUF_GENERAL_COMMAND",
            Status::InvalidField => "INVALID_FIELD",
            Status::UnsupportedAttribute => "UNSUPPORTED_ATTRIBUTE",
            Status::InvalidValue => "INVALID_VALUE",
            Status::ReadOnly => "READ_ONLY",
            Status::InsufficientSpace => "INSUFFICIENT_SPACE",
            Status::DuplicateExists => "DUPLICATE_EXISTS",
            Status::NotFound => "NOT_FOUND",
            Status::UnreportableAttribute => "UNREPORTABLE_ATTRIBUTE",
            Status::InvalidDataType => "INVALID_DATA_TYPE",
            Status::InvalidSelector => "INVALID_SELECTOR",
            Status::WriteOnly => "WRITE_ONLY",
            Status::InconsistentStartupState => "INCONSISTENT_STARTUP_STATE",
            Status::DefinedOutOfBand => "DEFINED_OUT_OF_BAND",
            Status::Inconsistent => "INCONSISTENT",
            Status::ActionDenied => "ACTION_DENIED",
            Status::Timeout => "TIMEOUT",
            Status::Abort => "ABORT",
            Status::InvalidImage => "INVALID_IMAGE",
            Status::WaitForData => "WAIT_FOR_DATA",
            Status::NoImageAvailable => "NO_IMAGE_AVAILABLE",
            Status::RequireMoreImage => "REQUIRE_MORE_IMAGE",
            Status::NotificationPending => "NOTIFICATION_PENDING",
            Status::HardwareFailure => "HARDWARE_FAILURE",
            Status::SoftwareFailure => "SOFTWARE_FAILURE",
            Status::CalibrationError => "CALIBRATION_ERROR",
            Status::UnsupportedCluster => "UNSUPPORTED_CLUSTER",
        }
    }

    /// Human readable form of a raw status byte, falling back to hex
    #[must_use]
    pub fn describe(code: u8) -> String {
        match Status::try_from(code) {
            Ok(status) => status.name().to_string(),
            Err(raw) => format!("{raw:#04x}"),
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Status::ALL
            .iter()
            .copied()
            .find(|status| *status as u8 == value)
            .ok_or(value)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ZCL attribute data types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    NoData = 0x00,
    Data8 = 0x08,
    Data16 = 0x09,
    Data24 = 0x0A,
    Data32 = 0x0B,
    Boolean = 0x10,
    Bitmap8 = 0x18,
    Bitmap16 = 0x19,
    Bitmap24 = 0x1A,
    Bitmap32 = 0x1B,
    Uint8 = 0x20,
    Uint16 = 0x21,
    Uint24 = 0x22,
    Uint32 = 0x23,
    Int8 = 0x28,
    Int16 = 0x29,
    Int24 = 0x2A,
    Int32 = 0x2B,
    Enum8 = 0x30,
    Enum16 = 0x31,
    Float16 = 0x38,
    Float32 = 0x39,
    Float64 = 0x3A,
    String = 0x42,
    Array = 0x48,
    Struct = 0x4C,
    Ieee = 0xF0,
}

impl DataType {
    /// Raw type code as sent in a write record
    #[must_use]
    pub fn code(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_u8() {
        assert_eq!(Status::try_from(0x00), Ok(Status::Success));
        assert_eq!(Status::try_from(0x85), Ok(Status::InvalidField));
        assert_eq!(Status::try_from(0x8b), Ok(Status::NotFound));
        assert_eq!(Status::try_from(0xc3), Ok(Status::UnsupportedCluster));
        assert_eq!(Status::try_from(0x42), Err(0x42));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(Status::UnsupportedAttribute.to_string(), "UNSUPPORTED_ATTRIBUTE");
        assert_eq!(Status::describe(0x86), "UNSUPPORTED_ATTRIBUTE");
        assert_eq!(Status::describe(0x42), "0x42");
    }

    #[test]
    fn test_error_status() {
        let err = ZclError::Status(Status::NotFound);
        assert_eq!(err.status(), Some(Status::NotFound));
        assert_eq!(err.to_string(), "Status 'NOT_FOUND'");
        assert_eq!(ZclError::Timeout.status(), None);
    }

    #[test]
    fn test_data_type_code() {
        assert_eq!(DataType::Uint24.code(), 0x22);
        assert_eq!(DataType::Int16.code(), 0x29);
        assert_eq!(DataType::Enum8.code(), 0x30);
    }
}
