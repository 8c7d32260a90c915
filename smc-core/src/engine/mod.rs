//! Thermal control engine
//!
//! Output Table, startup countdown, arbitration, the PID seam, loop
//! scheduling and the controller that ties them together.

mod arbitration;
mod controller;
mod output_table;
mod pid;
mod scheduler;
mod startup;

pub use arbitration::arbitrate;
pub use controller::{ThermalController, TickOutcome};
pub use output_table::OutputTable;
pub use pid::{DiscretePid, PidStep};
pub use scheduler::{read_process_value, LoopScheduler, StepReport};
pub use startup::{StartupPhase, StartupSequencer};

