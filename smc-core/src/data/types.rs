//! Core data types for the tray thermal controller
//!
//! Defines the control loop descriptors, their tuning parameters and the
//! sensor identifiers they are wired to.

use serde::{Deserialize, Serialize};
use std::fmt;

use smc_protocol::ControlMode;

use crate::constants::output;
use smc_error::{Result, ThermalError};

/// Stable identifier of a control resource.
///
/// For closed loops the id is also the Output Table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoopId(pub u16);

impl LoopId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for LoopId {
    fn from(id: u16) -> Self {
        LoopId(id)
    }
}

/// Sensors present on the tray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorId {
    Voltage,
    Current,
    TrayTemp,
    Power,
    FanTach,
    FanDuty,
    Hdd0Temp,
    Hdd1Temp,
}

impl SensorId {
    pub const ALL: [SensorId; 8] = [
        SensorId::Voltage,
        SensorId::Current,
        SensorId::TrayTemp,
        SensorId::Power,
        SensorId::FanTach,
        SensorId::FanDuty,
        SensorId::Hdd0Temp,
        SensorId::Hdd1Temp,
    ];

    /// Name the sensor is registered under
    pub fn name(self) -> &'static str {
        match self {
            SensorId::Voltage => "sen_voltage",
            SensorId::Current => "current_sensor",
            SensorId::TrayTemp => "tray_temp",
            SensorId::Power => "tray_power",
            SensorId::FanTach => "fan_tach",
            SensorId::FanDuty => "fan_duty",
            SensorId::Hdd0Temp => "hdd0_temp",
            SensorId::Hdd1Temp => "hdd1_temp",
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Measurement unit of a sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorUnit {
    Volt,
    Amp,
    Celsius,
    Watt,
    Rpm,
    Percent,
}

/// Closed `[min, max]` bound
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clamp {
    pub min: f32,
    pub max: f32,
}

impl Clamp {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the bound. Callers must have validated `min <= max`.
    pub fn apply(&self, value: f32) -> f32 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }

    pub fn is_ordered(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// Slew-rate limits in output units per second; zero disables a direction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SlewLimits {
    #[serde(default)]
    pub positive: f32,
    #[serde(default)]
    pub negative: f32,
}

/// Live tuning parameters of one PID loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuningParams {
    pub setpoint: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    #[serde(default = "default_integral_clamp")]
    pub integral: Clamp,
    #[serde(default = "default_output_clamp")]
    pub output: Clamp,
    #[serde(default)]
    pub slew: SlewLimits,
    #[serde(default)]
    pub deadband: f32,
}

fn default_integral_clamp() -> Clamp {
    Clamp::new(output::INTEGRAL_MIN, output::INTEGRAL_MAX)
}

fn default_output_clamp() -> Clamp {
    Clamp::new(output::LOOP_MIN, output::LOOP_MAX)
}

/// Where a loop reads its process variable from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "from", rename_all = "snake_case")]
pub enum LoopInput {
    /// A single sensor reading
    Sensor(SensorId),
    /// Mean of several sensor readings
    Average(Vec<SensorId>),
}

impl LoopInput {
    pub fn sensors(&self) -> &[SensorId] {
        match self {
            LoopInput::Sensor(id) => std::slice::from_ref(id),
            LoopInput::Average(ids) => ids,
        }
    }
}

/// A closed thermal control loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlLoop {
    pub id: LoopId,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_mode")]
    pub mode: ControlMode,
    /// Sample period in drive ticks
    pub period_ticks: u32,
    pub tuning: TuningParams,
    pub input: LoopInput,
}

fn default_enabled() -> bool {
    true
}

fn default_mode() -> ControlMode {
    ControlMode::Automatic
}

impl ControlLoop {
    /// Output Table slot this loop writes
    pub fn slot(&self) -> usize {
        self.id.index()
    }

    /// Whether the scheduler should step this loop
    pub fn is_active(&self) -> bool {
        self.enabled && self.mode == ControlMode::Automatic
    }

    /// Bound a computed output by the loop's output clamp before it reaches
    /// the Output Table
    pub fn bound_output(&self, value: f32) -> Result<f32> {
        if !value.is_finite() {
            return Err(ThermalError::invalid_argument(format!(
                "loop '{}' produced a non-finite output",
                self.name
            )));
        }
        Ok(self.tuning.output.apply(value))
    }
}

/// A control resource without tunable gains (fan duty passthrough)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassthroughControl {
    pub id: LoopId,
    pub name: String,
    /// Sensor whose reading is reported as the setpoint
    pub sensor: SensorId,
}

/// Global state of the thermal control configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThermalControlConfig {
    NotConfigured,
    Manual,
    Automatic,
}

impl ThermalControlConfig {
    /// Mode reported for every control under this configuration
    pub fn visible_mode(self) -> ControlMode {
        match self {
            ThermalControlConfig::NotConfigured | ThermalControlConfig::Manual => ControlMode::Manual,
            ThermalControlConfig::Automatic => ControlMode::Automatic,
        }
    }

    pub(crate) fn to_raw(self) -> u8 {
        match self {
            ThermalControlConfig::NotConfigured => 0,
            ThermalControlConfig::Manual => 1,
            ThermalControlConfig::Automatic => 2,
        }
    }

    pub(crate) fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ThermalControlConfig::Manual,
            2 => ThermalControlConfig::Automatic,
            _ => ThermalControlConfig::NotConfigured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_apply() {
        let clamp = Clamp::new(20.0, 90.0);
        assert_eq!(clamp.apply(5.0), 20.0);
        assert_eq!(clamp.apply(55.0), 55.0);
        assert_eq!(clamp.apply(120.0), 90.0);
        assert!(clamp.is_ordered());
        assert!(!Clamp::new(90.0, 20.0).is_ordered());
    }

    #[test]
    fn test_visible_mode() {
        use ControlMode::*;
        assert_eq!(ThermalControlConfig::NotConfigured.visible_mode(), Manual);
        assert_eq!(ThermalControlConfig::Manual.visible_mode(), Manual);
        assert_eq!(ThermalControlConfig::Automatic.visible_mode(), Automatic);
    }

    #[test]
    fn test_bound_output() {
        let control = crate::data::default_tray_loops().remove(0);
        assert_eq!(control.bound_output(55.0).unwrap(), 55.0);
        assert_eq!(control.bound_output(150.0).unwrap(), 90.0);
        assert_eq!(control.bound_output(-3.0).unwrap(), 20.0);
        assert!(matches!(
            control.bound_output(f32::NAN),
            Err(ThermalError::InvalidArgument(_))
        ));
        assert!(control.bound_output(f32::INFINITY).is_err());
    }

    #[test]
    fn test_loop_input_serde() {
        let input = LoopInput::Average(vec![SensorId::Hdd0Temp, SensorId::Hdd1Temp]);
        let json = serde_json::to_string(&input).unwrap();
        assert_eq!(json, r#"{"kind":"average","from":["hdd0_temp","hdd1_temp"]}"#);
        assert_eq!(input.sensors().len(), 2);
    }

    #[test]
    fn test_config_raw_roundtrip() {
        for cfg in [
            ThermalControlConfig::NotConfigured,
            ThermalControlConfig::Manual,
            ThermalControlConfig::Automatic,
        ] {
            assert_eq!(ThermalControlConfig::from_raw(cfg.to_raw()), cfg);
        }
    }
}
