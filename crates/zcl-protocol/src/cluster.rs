//! ZCL (Zigbee Cluster Library) cluster table

use std::fmt;

use serde_json::Value;

use crate::types::ZclError;

/// A cluster, known by id and (for standard clusters) by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cluster {
    pub id: u16,
    name: Option<&'static str>,
}

macro_rules! clusters {
    ($($konst:ident = ($id:expr, $name:expr);)*) => {
        impl Cluster {
            $(pub const $konst: Cluster = Cluster { id: $id, name: Some($name) };)*

            const KNOWN: &'static [Cluster] = &[$(Cluster::$konst),*];
        }
    };
}

clusters! {
    // General
    BASIC = (0x0000, "genBasic");
    POWER_CONFIG = (0x0001, "genPowerCfg");
    DEVICE_TEMP = (0x0002, "genDeviceTempCfg");
    IDENTIFY = (0x0003, "genIdentify");
    GROUPS = (0x0004, "genGroups");
    SCENES = (0x0005, "genScenes");
    ON_OFF = (0x0006, "genOnOff");
    ON_OFF_SWITCH_CONFIG = (0x0007, "genOnOffSwitchCfg");
    LEVEL_CONTROL = (0x0008, "genLevelCtrl");
    ALARMS = (0x0009, "genAlarms");
    TIME = (0x000A, "genTime");
    OTA = (0x0019, "genOta");
    POLL_CONTROL = (0x0020, "genPollCtrl");

    // Closures
    DOOR_LOCK = (0x0101, "closuresDoorLock");
    WINDOW_COVERING = (0x0102, "closuresWindowCovering");

    // HVAC
    THERMOSTAT = (0x0201, "hvacThermostat");
    FAN_CONTROL = (0x0202, "hvacFanCtrl");
    THERMOSTAT_UI_CONFIG = (0x0204, "hvacUserInterfaceCfg");

    // Lighting
    COLOR_CONTROL = (0x0300, "lightingColorCtrl");
    BALLAST_CONFIG = (0x0301, "lightingBallastCfg");

    // Measurement
    ILLUMINANCE_MEASUREMENT = (0x0400, "msIlluminanceMeasurement");
    TEMPERATURE_MEASUREMENT = (0x0402, "msTemperatureMeasurement");
    PRESSURE_MEASUREMENT = (0x0403, "msPressureMeasurement");
    HUMIDITY_MEASUREMENT = (0x0405, "msRelativeHumidity");
    OCCUPANCY_SENSING = (0x0406, "msOccupancySensing");

    // Security
    IAS_ZONE = (0x0500, "ssIasZone");
    IAS_ACE = (0x0501, "ssIasAce");
    IAS_WD = (0x0502, "ssIasWd");

    // Smart Energy
    METERING = (0x0702, "seMetering");
    ELECTRICAL_MEASUREMENT = (0x0B04, "haElectricalMeasurement");
}

impl Cluster {
    /// Look up a standard cluster by its ZCL name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Cluster> {
        Self::KNOWN.iter().copied().find(|c| c.name == Some(name))
    }

    /// Cluster for a numeric id; ids outside the table are kept as custom clusters
    #[must_use]
    pub fn from_id(id: u16) -> Cluster {
        Self::KNOWN
            .iter()
            .copied()
            .find(|c| c.id == id)
            .unwrap_or(Cluster { id, name: None })
    }

    /// Resolve a cluster given either as a name or a number in a request payload
    pub fn resolve(value: &Value) -> Result<Cluster, ZclError> {
        match value {
            Value::String(name) => {
                Cluster::from_name(name).ok_or_else(|| ZclError::UnknownCluster(name.clone()))
            }
            Value::Number(n) => n
                .as_u64()
                .and_then(|id| u16::try_from(id).ok())
                .map(Cluster::from_id)
                .ok_or_else(|| ZclError::UnknownCluster(n.to_string())),
            other => Err(ZclError::UnknownCluster(other.to_string())),
        }
    }

    /// ZCL name, if this is a standard cluster
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#06x}", self.id),
        }
    }
}

/// Frame direction for cluster-specific commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    ClientToServer = 0,
    ServerToClient = 1,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(Cluster::from_name("genOnOff"), Some(Cluster::ON_OFF));
        assert_eq!(Cluster::from_name("hvacThermostat").map(|c| c.id), Some(0x0201));
        assert_eq!(Cluster::from_name("bogus"), None);
    }

    #[test]
    fn test_lookup_by_id() {
        assert_eq!(Cluster::from_id(0x0300), Cluster::COLOR_CONTROL);
        let custom = Cluster::from_id(0xFC00);
        assert_eq!(custom.name(), None);
        assert_eq!(custom.to_string(), "0xfc00");
    }

    #[test]
    fn test_resolve_value() {
        assert_eq!(Cluster::resolve(&json!("genScenes")).unwrap(), Cluster::SCENES);
        assert_eq!(Cluster::resolve(&json!(258)).unwrap(), Cluster::WINDOW_COVERING);
        assert!(matches!(
            Cluster::resolve(&json!("nope")),
            Err(ZclError::UnknownCluster(_))
        ));
        assert!(Cluster::resolve(&json!(70000)).is_err());
        assert!(Cluster::resolve(&json!(true)).is_err());
    }
}
