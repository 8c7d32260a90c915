//! Per-loop sample scheduling
//!
//! Every loop runs on its own period, counted in drive ticks. A loop is
//! due on the first tick and then every `period_ticks` ticks. Due loops
//! that are enabled and automatic read their input, step their PID and
//! overwrite their Output Table slot.

use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use crate::data::{ControlLoop, LoopInput};
use crate::engine::output_table::OutputTable;
use crate::engine::pid::PidStep;
use crate::sensors::SensorSource;
use smc_error::{Result, ThermalError};

/// What one scheduling pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    /// Loops that produced a new output
    pub stepped: usize,
    /// Loops whose input could not be read; their slot kept its value
    pub input_failures: usize,
}

#[derive(Debug)]
pub struct LoopScheduler {
    /// Ticks left until each loop is due again
    countdown: Box<[AtomicU32]>,
}

impl LoopScheduler {
    pub fn new(loop_count: usize) -> Self {
        Self {
            countdown: (0..loop_count).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Advance the period counter of `control`; true when it is due this tick
    fn due(&self, control: &ControlLoop) -> bool {
        let Some(counter) = self.countdown.get(control.slot()) else {
            return false;
        };
        let left = counter.load(Ordering::Relaxed);
        if left == 0 {
            counter.store(control.period_ticks.saturating_sub(1), Ordering::Relaxed);
            true
        } else {
            counter.store(left - 1, Ordering::Relaxed);
            false
        }
    }

    /// Run one scheduling pass over `loops`
    pub fn run(
        &self,
        loops: &[ControlLoop],
        sensors: &dyn SensorSource,
        stepper: &dyn PidStep,
        outputs: &OutputTable,
    ) -> StepReport {
        let mut report = StepReport::default();

        for control in loops {
            if !self.due(control) || !control.is_active() {
                continue;
            }

            let pv = match read_process_value(&control.input, sensors) {
                Ok(pv) => pv,
                Err(e) => {
                    warn!("CONTROL: loop '{}' skipped: {}", control.name, e);
                    report.input_failures += 1;
                    continue;
                }
            };

            let out = match control.bound_output(stepper.step(control, pv)) {
                Ok(out) => out,
                Err(e) => {
                    warn!("CONTROL: loop '{}' output dropped: {}", control.name, e);
                    continue;
                }
            };
            if let Err(e) = outputs.write(control.slot(), out) {
                warn!("CONTROL: loop '{}' output dropped: {}", control.name, e);
                continue;
            }
            debug!("CONTROL: loop '{}' pv={:.2} -> {:.2}", control.name, pv, out);
            report.stepped += 1;
        }

        report
    }
}

/// Read the process value a loop input is bound to
pub fn read_process_value(input: &LoopInput, sensors: &dyn SensorSource) -> Result<f32> {
    match input {
        LoopInput::Sensor(id) => sensors.read(*id),
        LoopInput::Average(ids) => {
            if ids.is_empty() {
                return Err(ThermalError::input_unavailable("average", "no sensors bound"));
            }
            let mut sum = 0.0;
            for id in ids {
                sum += sensors.read(*id)?;
            }
            Ok(sum / ids.len() as f32)
        }
    }
}
