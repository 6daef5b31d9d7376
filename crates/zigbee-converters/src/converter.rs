//! The toZigbee converter contract
//!
//! Every converter is a variant of [`Converter`]. A converter claims a set of
//! external state keys; `convert_set` encodes a requested value into ZCL
//! traffic and returns an optimistic state patch, `convert_get` triggers the
//! reads whose answers arrive later as reports.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use zigbee_core::{Entity, EntityStore};

use crate::definition::Definition;
use crate::error::ConvertError;
use crate::expose::{self, Expose};
use crate::options::DeviceOptions;
use crate::tz;

macro_rules! converters {
    ($($variant:ident => $name:literal [$($key:literal),*];)*) => {
        /// A named conversion unit
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Converter {
            $($variant,)*
        }

        impl Converter {
            pub const ALL: &'static [Converter] = &[$(Converter::$variant),*];

            /// Catalog name
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Converter::$variant => $name,)*
                }
            }

            /// External state keys this converter claims
            #[must_use]
            pub fn keys(self) -> &'static [&'static str] {
                match self {
                    $(Converter::$variant => &[$($key),*],)*
                }
            }
        }
    };
}

converters! {
    // Generic
    Read => "read" ["read"];
    Write => "write" ["write"];
    Command => "command" ["command"];
    FactoryReset => "factory_reset" ["reset"];
    Identify => "identify" ["identify"];
    PowerOnBehavior => "power_on_behavior" ["power_on_behavior"];
    OccupancyTimeout => "occupancy_timeout" ["occupancy_timeout"];
    BatteryPercentageRemaining => "battery_percentage_remaining" ["battery"];
    BatteryVoltage => "battery_voltage" ["battery", "voltage"];
    IgnoreTransition => "ignore_transition" ["transition"];

    // Lights
    OnOff => "on_off" ["state", "on_time", "off_wait_time"];
    LightOnoffBrightness => "light_onoff_brightness" ["state", "brightness", "brightness_percent", "on_time", "off_wait_time"];
    LightOnoffRestorableBrightness => "light_onoff_restorable_brightness" ["state", "brightness", "brightness_percent"];
    LightBrightnessStep => "light_brightness_step" ["brightness_step", "brightness_step_onoff"];
    LightBrightnessMove => "light_brightness_move" ["brightness_move", "brightness_move_onoff"];
    LightColor => "light_color" ["color"];
    LightColortemp => "light_colortemp" ["color_temp", "color_temp_percent"];
    LightColorColortemp => "light_color_colortemp" ["color", "color_temp", "color_temp_percent"];
    LightColorAndColortempViaColor => "light_color_and_colortemp_via_color" ["color", "color_temp", "color_temp_percent"];
    LightColortempStartup => "light_colortemp_startup" ["color_temp_startup"];
    LightColortempStep => "light_colortemp_step" ["color_temp_step"];
    LightHueSaturationStep => "light_hue_saturation_step" ["hue_step", "saturation_step"];
    LightHueSaturationMove => "light_hue_saturation_move" ["hue_move", "saturation_move"];
    LightColorMode => "light_color_mode" ["color_mode"];
    LightColorOptions => "light_color_options" ["color_options"];
    Effect => "effect" ["effect", "alert", "flash"];
    LevelConfig => "level_config" ["level_config"];
    BallastConfig => "ballast_config" ["ballast_config", "ballast_minimum_level", "ballast_maximum_level", "ballast_power_on_level"];

    // Covers
    CoverState => "cover_state" ["state"];
    CoverPositionTilt => "cover_position_tilt" ["position", "tilt"];
    CoverViaBrightness => "cover_via_brightness" ["position", "state"];
    CoverMode => "cover_mode" ["cover_mode"];

    // Locks
    Lock => "lock" ["state"];
    LockAutoRelockTime => "lock_auto_relock_time" ["auto_relock_time"];
    LockSoundVolume => "lock_sound_volume" ["sound_volume"];
    PincodeLock => "pincode_lock" ["pin_code"];
    LockUserstatus => "lock_userstatus" ["user_status"];

    // Thermostats and fans
    ThermostatSystemMode => "thermostat_system_mode" ["system_mode"];
    ThermostatControlSequenceOfOperation => "thermostat_control_sequence_of_operation" ["control_sequence_of_operation"];
    ThermostatProgrammingOperationMode => "thermostat_programming_operation_mode" ["programming_operation_mode"];
    ThermostatTemperatureDisplayMode => "thermostat_temperature_display_mode" ["temperature_display_mode"];
    ThermostatKeypadLockout => "thermostat_keypad_lockout" ["keypad_lockout"];
    ThermostatOccupiedHeatingSetpoint => "thermostat_occupied_heating_setpoint" ["occupied_heating_setpoint"];
    ThermostatUnoccupiedHeatingSetpoint => "thermostat_unoccupied_heating_setpoint" ["unoccupied_heating_setpoint"];
    ThermostatOccupiedCoolingSetpoint => "thermostat_occupied_cooling_setpoint" ["occupied_cooling_setpoint"];
    ThermostatUnoccupiedCoolingSetpoint => "thermostat_unoccupied_cooling_setpoint" ["unoccupied_cooling_setpoint"];
    ThermostatMinHeatSetpointLimit => "thermostat_min_heat_setpoint_limit" ["min_heat_setpoint_limit"];
    ThermostatMaxHeatSetpointLimit => "thermostat_max_heat_setpoint_limit" ["max_heat_setpoint_limit"];
    ThermostatMinCoolSetpointLimit => "thermostat_min_cool_setpoint_limit" ["min_cool_setpoint_limit"];
    ThermostatMaxCoolSetpointLimit => "thermostat_max_cool_setpoint_limit" ["max_cool_setpoint_limit"];
    ThermostatLocalTemperatureCalibration => "thermostat_local_temperature_calibration" ["local_temperature_calibration"];
    ThermostatSetpointRaiseLower => "thermostat_setpoint_raise_lower" ["setpoint_raise_lower"];
    ThermostatLocalTemperature => "thermostat_local_temperature" ["local_temperature"];
    ThermostatRunningState => "thermostat_running_state" ["running_state"];
    ThermostatPiHeatingDemand => "thermostat_pi_heating_demand" ["pi_heating_demand"];
    ThermostatClearWeeklySchedule => "thermostat_clear_weekly_schedule" ["clear_weekly_schedule"];
    ThermostatTemperatureSetpointHold => "thermostat_temperature_setpoint_hold" ["temperature_setpoint_hold"];
    ThermostatTemperatureSetpointHoldDuration => "thermostat_temperature_setpoint_hold_duration" ["temperature_setpoint_hold_duration"];
    ThermostatRemoteSensing => "thermostat_remote_sensing" ["remote_sensing"];
    FanMode => "fan_mode" ["fan_mode", "fan_state"];
    FanSpeed => "fan_speed" ["speed"];

    // Eurotronic
    EurotronicHostFlags => "eurotronic_host_flags" ["eurotronic_host_flags", "system_mode"];
    EurotronicErrorStatus => "eurotronic_error_status" ["eurotronic_error_status"];
    EurotronicCurrentHeatingSetpoint => "eurotronic_current_heating_setpoint" ["current_heating_setpoint"];
    EurotronicValvePosition => "eurotronic_valve_position" ["eurotronic_valve_position", "valve_position"];
    EurotronicTrvMode => "eurotronic_trv_mode" ["eurotronic_trv_mode", "trv_mode"];
    EurotronicChildLock => "eurotronic_child_lock" ["eurotronic_child_lock", "child_lock"];
    EurotronicMirrorDisplay => "eurotronic_mirror_display" ["eurotronic_mirror_display", "mirror_display"];

    // Livolo
    LivoloSwitchOnOff => "livolo_switch_on_off" ["state"];
    LivoloSocketSwitchOnOff => "livolo_socket_switch_on_off" ["state"];
    LivoloDimmerLevel => "livolo_dimmer_level" ["brightness", "brightness_percent", "level"];
    LivoloCoverPosition => "livolo_cover_position" ["position"];
    LivoloCoverOptions => "livolo_cover_options" ["options"];

    // IAS
    Warning => "warning" ["warning"];
    WarningSimple => "warning_simple" ["alarm"];
    Squawk => "squawk" ["squawk"];
    IasMaxDuration => "ias_max_duration" ["max_duration"];
    ArmMode => "arm_mode" ["arm_mode"];

    // Scenes
    SceneStore => "scene_store" ["scene_store"];
    SceneRecall => "scene_recall" ["scene_recall"];
    SceneAdd => "scene_add" ["scene_add"];
    SceneRemove => "scene_remove" ["scene_remove"];
    SceneRemoveAll => "scene_remove_all" ["scene_remove_all"];
    SceneRename => "scene_rename" ["scene_rename"];
}

/// The definition(s) a request is resolved against
#[derive(Debug, Clone, Copy)]
pub enum Mapped<'a> {
    Device(&'a Definition),
    /// One definition per group member, in member order
    Group(&'a [Arc<Definition>]),
}

impl<'a> Mapped<'a> {
    /// Definition of the device at `index` (always the device for a single endpoint)
    #[must_use]
    pub fn definition(&self, index: usize) -> Option<&'a Definition> {
        match self {
            Mapped::Device(definition) => Some(definition),
            Mapped::Group(definitions) => definitions.get(index).map(AsRef::as_ref),
        }
    }

    #[must_use]
    pub fn first(&self) -> Option<&'a Definition> {
        self.definition(0)
    }

    /// Model of the device, or of the first group member
    #[must_use]
    pub fn model(&self) -> Option<&'a str> {
        self.first().map(|d| d.model.as_str())
    }

    pub(crate) fn definitions(&self) -> Vec<&'a Definition> {
        match self {
            Mapped::Device(definition) => vec![*definition],
            Mapped::Group(definitions) => definitions.iter().map(AsRef::as_ref).collect(),
        }
    }
}

/// Per-request context handed to every converter
#[derive(Debug, Clone, Copy)]
pub struct Meta<'a> {
    /// The complete request payload
    pub message: &'a Map<String, Value>,
    /// Last known state of the entity
    pub state: &'a Map<String, Value>,
    pub options: &'a DeviceOptions,
    pub mapped: Mapped<'a>,
    /// Sub-endpoint label of multi-endpoint devices
    pub endpoint_name: Option<&'a str>,
    /// Current state of each group member, keyed by IEEE address
    pub members_state: Option<&'a Map<String, Value>>,
    pub store: &'a EntityStore,
}

/// Optimistic result of a set request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Map<String, Value>>,
    /// Delay in milliseconds after which the caller should read back the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_after_write_time: Option<u64>,
    /// Per-member state patches of a group request, keyed by IEEE address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members_state: Option<Map<String, Value>>,
}

impl ConvertOutcome {
    #[must_use]
    pub fn state(state: Map<String, Value>) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// Outcome patching a single key
    #[must_use]
    pub fn single(key: &str, value: Value) -> Self {
        let mut state = Map::new();
        state.insert(key.to_string(), value);
        Self::state(state)
    }

    #[must_use]
    pub fn with_read_after_write(mut self, millis: u64) -> Self {
        self.read_after_write_time = Some(millis);
        self
    }
}

pub type SetResult = Result<Option<ConvertOutcome>, ConvertError>;

impl Converter {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Converter> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Options the converter reads from [`DeviceOptions`]
    #[must_use]
    pub fn options(self) -> Vec<Expose> {
        use expose::options;
        match self {
            Converter::LightColor
            | Converter::LightColortemp
            | Converter::LightColorColortemp
            | Converter::LightColorAndColortempViaColor => vec![options::color_sync(), options::transition()],
            Converter::LightOnoffBrightness
            | Converter::LightOnoffRestorableBrightness
            | Converter::LightBrightnessStep
            | Converter::LightColortempStep
            | Converter::LightHueSaturationStep => vec![options::transition()],
            Converter::Identify => vec![options::identify_timeout()],
            Converter::CoverViaBrightness => vec![options::invert_cover()],
            Converter::CoverPositionTilt => vec![options::invert_cover(), options::cover_position_tilt_disable_report()],
            Converter::ThermostatOccupiedHeatingSetpoint
            | Converter::ThermostatUnoccupiedHeatingSetpoint
            | Converter::ThermostatOccupiedCoolingSetpoint
            | Converter::ThermostatUnoccupiedCoolingSetpoint => vec![options::thermostat_unit()],
            _ => Vec::new(),
        }
    }

    /// Encode `value` for `key` and send it to `entity`.
    ///
    /// Returns `None` when the converter has nothing to report back.
    pub async fn convert_set(self, entity: &Entity, key: &str, value: &Value, meta: &Meta<'_>) -> SetResult {
        use tz::{color, cover, eurotronic, generic, ias, light, livolo, lock, scene, thermostat};
        match self {
            Converter::Read => generic::read(entity, value, meta).await,
            Converter::Write => generic::write(entity, value, meta).await,
            Converter::Command => generic::command(entity, value, meta).await,
            Converter::FactoryReset => generic::factory_reset(entity, meta).await,
            Converter::Identify => generic::identify(entity, value, meta).await,
            Converter::PowerOnBehavior => generic::power_on_behavior(entity, value, meta).await,
            Converter::OccupancyTimeout => generic::occupancy_timeout(entity, value).await,
            Converter::IgnoreTransition => Ok(None),

            Converter::OnOff => light::on_off(entity, meta).await,
            Converter::LightOnoffBrightness => light::onoff_brightness(entity, meta).await,
            Converter::LightOnoffRestorableBrightness => light::onoff_restorable_brightness(entity, meta).await,
            Converter::LightBrightnessStep => light::brightness_step(entity, key, value, meta).await,
            Converter::LightBrightnessMove => light::brightness_move(entity, key, value, meta).await,
            Converter::Effect => light::effect(entity, key, value, meta).await,
            Converter::LevelConfig => light::level_config(entity, value, meta).await,
            Converter::BallastConfig => light::ballast_config(entity, key, value).await,

            Converter::LightColor => color::color(entity, key, value, meta).await,
            Converter::LightColortemp => color::colortemp(entity, key, value, meta).await,
            Converter::LightColorColortemp => color::color_colortemp(entity, key, value, meta).await,
            Converter::LightColorAndColortempViaColor => color::color_via_color(entity, key, value, meta).await,
            Converter::LightColortempStartup => color::colortemp_startup(entity, value).await,
            Converter::LightColortempStep => color::colortemp_step(entity, key, value, meta).await,
            Converter::LightHueSaturationStep => color::hue_saturation_step(entity, key, value, meta).await,
            Converter::LightHueSaturationMove => color::hue_saturation_move(entity, key, value, meta).await,
            Converter::LightColorOptions => color::color_options(entity, value).await,

            Converter::CoverState => cover::state(entity, value, meta).await,
            Converter::CoverPositionTilt => cover::position_tilt(entity, key, value, meta).await,
            Converter::CoverViaBrightness => cover::via_brightness(entity, value, meta).await,
            Converter::CoverMode => cover::mode(entity, value).await,

            Converter::Lock => lock::lock(entity, value, meta).await,
            Converter::LockAutoRelockTime => lock::auto_relock_time(entity, value).await,
            Converter::LockSoundVolume => lock::sound_volume(entity, value).await,
            Converter::PincodeLock => lock::pincode(entity, value, meta).await,
            Converter::LockUserstatus => lock::user_status(entity, value, meta).await,

            Converter::ThermostatSystemMode => thermostat::system_mode(entity, value).await,
            Converter::ThermostatControlSequenceOfOperation => thermostat::control_sequence(entity, value).await,
            Converter::ThermostatProgrammingOperationMode => thermostat::programming_operation_mode(entity, value).await,
            Converter::ThermostatTemperatureDisplayMode => thermostat::temperature_display_mode(entity, value).await,
            Converter::ThermostatKeypadLockout => thermostat::keypad_lockout(entity, value).await,
            Converter::ThermostatOccupiedHeatingSetpoint
            | Converter::ThermostatUnoccupiedHeatingSetpoint
            | Converter::ThermostatOccupiedCoolingSetpoint
            | Converter::ThermostatUnoccupiedCoolingSetpoint
            | Converter::ThermostatMinHeatSetpointLimit
            | Converter::ThermostatMaxHeatSetpointLimit
            | Converter::ThermostatMinCoolSetpointLimit
            | Converter::ThermostatMaxCoolSetpointLimit => thermostat::setpoint(entity, key, value, meta).await,
            Converter::ThermostatLocalTemperatureCalibration => thermostat::local_temperature_calibration(entity, value).await,
            Converter::ThermostatSetpointRaiseLower => thermostat::setpoint_raise_lower(entity, value, meta).await,
            Converter::ThermostatClearWeeklySchedule => thermostat::clear_weekly_schedule(entity, meta).await,
            Converter::ThermostatTemperatureSetpointHold => thermostat::setpoint_hold(entity, value).await,
            Converter::ThermostatTemperatureSetpointHoldDuration => thermostat::setpoint_hold_duration(entity, value).await,
            Converter::ThermostatRemoteSensing => thermostat::remote_sensing(entity, value).await,
            Converter::FanMode => thermostat::fan_mode(entity, value).await,
            Converter::FanSpeed => thermostat::fan_speed(entity, value, meta).await,

            Converter::EurotronicHostFlags
            | Converter::EurotronicChildLock
            | Converter::EurotronicMirrorDisplay => eurotronic::host_flags(entity, key, value, meta).await,
            Converter::EurotronicCurrentHeatingSetpoint => eurotronic::current_heating_setpoint(entity, value).await,
            Converter::EurotronicValvePosition => eurotronic::valve_position(entity, key, value).await,
            Converter::EurotronicTrvMode => eurotronic::trv_mode(entity, key, value).await,

            Converter::LivoloSwitchOnOff => livolo::switch_on_off(entity, value, meta).await,
            Converter::LivoloSocketSwitchOnOff => livolo::socket_switch_on_off(entity, value, meta).await,
            Converter::LivoloDimmerLevel => livolo::dimmer_level(entity, key, value).await,
            Converter::LivoloCoverPosition => livolo::cover_position(entity, value).await,
            Converter::LivoloCoverOptions => livolo::cover_options(entity, value).await,

            Converter::Warning => ias::warning(entity, value, meta).await,
            Converter::WarningSimple => ias::warning_simple(entity, value, meta).await,
            Converter::Squawk => ias::squawk(entity, value, meta).await,
            Converter::IasMaxDuration => ias::max_duration(entity, value).await,
            Converter::ArmMode => ias::arm_mode(entity, value, meta).await,

            Converter::SceneStore => scene::store(entity, value, meta).await,
            Converter::SceneRecall => scene::recall(entity, value, meta).await,
            Converter::SceneAdd => scene::add(entity, value, meta).await,
            Converter::SceneRemove => scene::remove(entity, value, meta).await,
            Converter::SceneRemoveAll => scene::remove_all(entity, meta).await,
            Converter::SceneRename => scene::rename(entity, value, meta).await,

            Converter::BatteryPercentageRemaining
            | Converter::BatteryVoltage
            | Converter::LightColorMode
            | Converter::ThermostatLocalTemperature
            | Converter::ThermostatRunningState
            | Converter::ThermostatPiHeatingDemand
            | Converter::EurotronicErrorStatus => Err(ConvertError::Unsupported(format!(
                "Converter '{}' does not support set",
                self.name()
            ))),
        }
    }

    /// Ask the device to report the current value of `key`
    pub async fn convert_get(self, entity: &Entity, key: &str, meta: &Meta<'_>) -> Result<(), ConvertError> {
        use tz::{color, cover, eurotronic, generic, light, livolo, lock, thermostat};
        use zcl_protocol::Cluster;
        match self {
            Converter::Identify => Ok(()),
            Converter::PowerOnBehavior => generic::read_one(entity, Cluster::ON_OFF, "startUpOnOff").await,
            Converter::BatteryPercentageRemaining => {
                generic::read_one(entity, Cluster::POWER_CONFIG, "batteryPercentageRemaining").await
            }
            Converter::BatteryVoltage => generic::read_one(entity, Cluster::POWER_CONFIG, "batteryVoltage").await,

            Converter::OnOff => generic::read_one(entity, Cluster::ON_OFF, "onOff").await,
            Converter::LightOnoffBrightness | Converter::LightOnoffRestorableBrightness => {
                light::onoff_brightness_get(entity, key).await
            }
            Converter::LevelConfig => light::level_config_get(entity).await,
            Converter::BallastConfig => light::ballast_config_get(entity).await,

            Converter::LightColor => color::color_get(entity, meta, &[]).await,
            Converter::LightColortemp => color::colortemp_get(entity).await,
            Converter::LightColorColortemp | Converter::LightColorAndColortempViaColor => {
                color::color_get(entity, meta, &["colorTemperature"]).await
            }
            Converter::LightColortempStartup => {
                generic::read_one(entity, Cluster::COLOR_CONTROL, "startUpColorTemperature").await
            }
            Converter::LightColorMode => generic::read_one(entity, Cluster::COLOR_CONTROL, "colorMode").await,
            Converter::LightColorOptions => generic::read_one(entity, Cluster::COLOR_CONTROL, "options").await,

            Converter::CoverState | Converter::CoverPositionTilt => cover::position_tilt_get(entity, key).await,
            Converter::CoverViaBrightness => generic::read_one(entity, Cluster::LEVEL_CONTROL, "currentLevel").await,

            Converter::Lock => generic::read_one(entity, Cluster::DOOR_LOCK, "lockState").await,
            Converter::LockAutoRelockTime => generic::read_one(entity, Cluster::DOOR_LOCK, "autoRelockTime").await,
            Converter::LockSoundVolume => generic::read_one(entity, Cluster::DOOR_LOCK, "soundVolume").await,
            Converter::PincodeLock => lock::pincode_get(entity, meta).await,
            Converter::LockUserstatus => lock::user_status_get(entity, meta).await,

            Converter::ThermostatSystemMode
            | Converter::ThermostatControlSequenceOfOperation
            | Converter::ThermostatProgrammingOperationMode
            | Converter::ThermostatTemperatureDisplayMode
            | Converter::ThermostatKeypadLockout
            | Converter::ThermostatOccupiedHeatingSetpoint
            | Converter::ThermostatUnoccupiedHeatingSetpoint
            | Converter::ThermostatOccupiedCoolingSetpoint
            | Converter::ThermostatUnoccupiedCoolingSetpoint
            | Converter::ThermostatMinHeatSetpointLimit
            | Converter::ThermostatMaxHeatSetpointLimit
            | Converter::ThermostatMinCoolSetpointLimit
            | Converter::ThermostatMaxCoolSetpointLimit
            | Converter::ThermostatLocalTemperatureCalibration
            | Converter::ThermostatLocalTemperature
            | Converter::ThermostatRunningState
            | Converter::ThermostatPiHeatingDemand
            | Converter::ThermostatTemperatureSetpointHold
            | Converter::ThermostatTemperatureSetpointHoldDuration
            | Converter::ThermostatRemoteSensing
            | Converter::FanMode
            | Converter::FanSpeed => thermostat::get(self, entity).await,

            Converter::EurotronicHostFlags
            | Converter::EurotronicChildLock
            | Converter::EurotronicMirrorDisplay
            | Converter::EurotronicErrorStatus
            | Converter::EurotronicCurrentHeatingSetpoint
            | Converter::EurotronicValvePosition
            | Converter::EurotronicTrvMode => eurotronic::get(self, entity).await,

            Converter::LivoloSwitchOnOff
            | Converter::LivoloSocketSwitchOnOff
            | Converter::LivoloDimmerLevel
            | Converter::LivoloCoverPosition => livolo::get(entity).await,

            Converter::IasMaxDuration => generic::read_one(entity, Cluster::IAS_WD, "maxDuration").await,
            Converter::OccupancyTimeout => {
                generic::read_one(entity, Cluster::OCCUPANCY_SENSING, "pirOToUDelay").await
            }
            Converter::ArmMode
            | Converter::Warning
            | Converter::WarningSimple
            | Converter::Squawk
            | Converter::Read
            | Converter::Write
            | Converter::Command
            | Converter::FactoryReset
            | Converter::IgnoreTransition
            | Converter::LightBrightnessStep
            | Converter::LightBrightnessMove
            | Converter::LightColortempStep
            | Converter::LightHueSaturationStep
            | Converter::LightHueSaturationMove
            | Converter::Effect
            | Converter::CoverMode
            | Converter::ThermostatSetpointRaiseLower
            | Converter::ThermostatClearWeeklySchedule
            | Converter::LivoloCoverOptions
            | Converter::SceneStore
            | Converter::SceneRecall
            | Converter::SceneAdd
            | Converter::SceneRemove
            | Converter::SceneRemoveAll
            | Converter::SceneRename => Err(ConvertError::GetNotSupported(self.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_unique_and_resolvable() {
        let names: HashSet<_> = Converter::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(names.len(), Converter::ALL.len());
        for converter in Converter::ALL {
            assert_eq!(Converter::from_name(converter.name()), Some(*converter));
            assert!(!converter.keys().is_empty(), "{} claims no keys", converter.name());
        }
        assert_eq!(Converter::from_name("nope"), None);
    }

    #[test]
    fn test_keys_and_options() {
        assert_eq!(Converter::FactoryReset.keys(), &["reset"]);
        assert_eq!(Converter::EurotronicChildLock.keys(), &["eurotronic_child_lock", "child_lock"]);
        let names: Vec<_> = Converter::CoverPositionTilt
            .options()
            .iter()
            .filter_map(|o| o.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["invert_cover", "cover_position_tilt_disable_report"]);
        assert!(Converter::Read.options().is_empty());
    }

    #[test]
    fn test_outcome_serializes_camel_case() {
        let outcome = ConvertOutcome::single("brightness", Value::from(100)).with_read_after_write(200);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({"state": {"brightness": 100}, "readAfterWriteTime": 200}));
    }
}
