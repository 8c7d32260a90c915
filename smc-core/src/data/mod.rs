//! Data types, default tables and validation
//!
//! Contains the control loop descriptors and everything needed to check a
//! loop table before the controller is built from it.

pub mod config;
mod types;
mod validation;

pub use config::{default_passthrough, default_tray_loops, CONTROL_FAN, LOOP_HDD, LOOP_VR};
pub use types::{
    Clamp, ControlLoop, LoopId, LoopInput, PassthroughControl, SensorId, SensorUnit, SlewLimits,
    ThermalControlConfig, TuningParams,
};
pub use validation::{
    validate_clamp, validate_control_name, validate_file_size, validate_loop, validate_loop_set,
};
