//! Default control tables for the storage tray
//!
//! Two closed loops drive the shared fan: the VR loop follows the tray
//! temperature every tick, the HDD loop follows the average drive
//! temperature once a minute. The fan duty control is exposed as a
//! passthrough resource without gains.

use smc_protocol::ControlMode;

use crate::constants::output;
use crate::data::types::{
    Clamp, ControlLoop, LoopId, LoopInput, PassthroughControl, SensorId, SlewLimits, TuningParams,
};

/// Closed loop id of the voltage regulator zone
pub const LOOP_VR: LoopId = LoopId(0);

/// Closed loop id of the drive zone
pub const LOOP_HDD: LoopId = LoopId(1);

/// Control id of the fan duty passthrough
pub const CONTROL_FAN: LoopId = LoopId(2);

fn tray_tuning(setpoint: f32, kp: f32, ki: f32) -> TuningParams {
    TuningParams {
        setpoint,
        kp,
        ki,
        kd: 0.0,
        integral: Clamp::new(output::INTEGRAL_MIN, output::INTEGRAL_MAX),
        output: Clamp::new(output::LOOP_MIN, output::LOOP_MAX),
        slew: SlewLimits::default(),
        deadband: 0.0,
    }
}

/// The closed loops the tray ships with
pub fn default_tray_loops() -> Vec<ControlLoop> {
    vec![
        ControlLoop {
            id: LOOP_VR,
            name: "VRs".to_string(),
            enabled: true,
            mode: ControlMode::Automatic,
            period_ticks: 1,
            tuning: tray_tuning(66.0, -0.1, -0.05),
            input: LoopInput::Sensor(SensorId::TrayTemp),
        },
        ControlLoop {
            id: LOOP_HDD,
            name: "HDD".to_string(),
            enabled: true,
            mode: ControlMode::Automatic,
            period_ticks: 60,
            tuning: tray_tuning(48.0, -4.0, -0.01),
            input: LoopInput::Average(vec![SensorId::Hdd0Temp, SensorId::Hdd1Temp]),
        },
    ]
}

/// Controls reported without tunable gains
pub fn default_passthrough() -> Vec<PassthroughControl> {
    vec![PassthroughControl {
        id: CONTROL_FAN,
        name: "Fan".to_string(),
        sensor: SensorId::FanDuty,
    }]
}
