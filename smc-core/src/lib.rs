//! SMC Thermal Core Library
//!
//! Closed-loop thermal control for the storage-tray management controller.
//! Several independent PID loops each write their latest output into an
//! Output Table; once per drive tick the table is reduced to a single fan
//! command.
//!
//! # Features
//!
//! - **Arbitration**: max of the enabled loop outputs, or a floor just below
//!   the loop minimum when nothing is enabled
//! - **Startup override**: a fixed fan command for the first ticks after
//!   installation
//! - **Loop scheduling**: each loop samples on its own period
//! - **Runtime info**: live setpoint, gains and mode of every control
//! - **Settings**: JSON settings with validated defaults for the tray
//!
//! # Module Structure
//!
//! - `data/` - Loop descriptors, default tables, validation
//! - `engine/` - Output Table, startup, arbitration, PID seam, controller
//! - `sensors` - Sensor table and the input/actuator seams
//! - `runtime_info` - Introspection surface
//!
//! # Example
//!
//! ```no_run
//! use smc_core::{tray_sensor_table, ThermalController, ThermalSettings};
//!
//! let controller = ThermalController::new(&ThermalSettings::default()).unwrap();
//! controller.install();
//! let sensors = tray_sensor_table();
//! let outcome = controller.drive_tick(&sensors).unwrap();
//! println!("fan duty {:.1}", outcome.command);
//! ```

// Grouped modules
pub mod data;
pub mod engine;

// Standalone modules
pub mod constants;
pub mod runtime_info;
pub mod sensors;
pub mod settings;

pub use data::{
    Clamp, ControlLoop, LoopId, LoopInput, PassthroughControl, SensorId, SensorUnit, SlewLimits,
    ThermalControlConfig, TuningParams,
};

pub use data::{default_passthrough, default_tray_loops, CONTROL_FAN, LOOP_HDD, LOOP_VR};

pub use engine::{
    arbitrate, DiscretePid, OutputTable, PidStep, StartupPhase, StartupSequencer, StepReport,
    ThermalController, TickOutcome,
};

pub use runtime_info::RuntimeInfoAccessor;
pub use sensors::{tray_sensor_table, Actuator, SensorSource, SensorSpec, SensorTable};
pub use settings::{load_settings, save_settings, DriveSettings, ThermalSettings};

pub use smc_error::{Result, ThermalError};
pub use smc_protocol::{ConfigAck, ControlConfigParams, ControlMode, ControlRuntimeInfo};
