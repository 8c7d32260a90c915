//! Thermal controller
//!
//! Owns the loop table, the Output Table, the startup countdown and the
//! last issued fan command. Two entry points are driven from the outside:
//!
//! - [`ThermalController::step_loops`] lets due loops compute and write
//!   their slots.
//! - [`ThermalController::drive_tick`] produces the fan command for this
//!   tick and hands it to the actuator.
//!
//! Neither blocks. Loop configuration sits behind a `RwLock` and is copied
//! out for readers; the Output Table and the command are atomics.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::data::{ControlLoop, LoopId, PassthroughControl, SensorId, ThermalControlConfig};
use crate::engine::arbitration::arbitrate;
use crate::engine::output_table::OutputTable;
use crate::engine::pid::PidStep;
use crate::engine::scheduler::{LoopScheduler, StepReport};
use crate::engine::startup::{StartupPhase, StartupSequencer};
use crate::sensors::{Actuator, SensorSource};
use crate::settings::ThermalSettings;
use smc_error::{Result, ThermalError};

/// Result of one drive tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub phase: StartupPhase,
    pub command: f32,
}

#[derive(Debug)]
pub struct ThermalController {
    loops: Arc<RwLock<Vec<ControlLoop>>>,
    passthrough: Vec<PassthroughControl>,
    outputs: OutputTable,
    scheduler: LoopScheduler,
    startup: StartupSequencer,
    floor: f32,
    start_output: f32,
    /// Control configuration applied by `install`
    configured: ThermalControlConfig,
    config: AtomicU8,
    command: AtomicU32,
}

impl ThermalController {
    /// Build a controller from validated settings
    ///
    /// The controller starts `NotConfigured`; call [`install`](Self::install)
    /// once it is wired to its collaborators.
    pub fn new(settings: &ThermalSettings) -> Result<Self> {
        settings.validate()?;

        let drive = &settings.drive;
        let loops = settings.loops.clone();
        // Neutral value: every slot starts at its loop's output minimum
        let outputs = OutputTable::new(loops.len(), 0.0);
        for control in &loops {
            outputs.write(control.slot(), control.tuning.output.min)?;
        }

        // Without a startup phase nothing is demanded until the first tick
        let initial_command = if drive.start_phase_ticks > 0 {
            drive.start_output
        } else {
            drive.output_floor
        };

        info!(
            "Thermal controller created: {} loops, startup {} ticks at {:.1}, floor {:.2}",
            loops.len(),
            drive.start_phase_ticks,
            drive.start_output,
            drive.output_floor
        );

        Ok(Self {
            scheduler: LoopScheduler::new(loops.len()),
            loops: Arc::new(RwLock::new(loops)),
            passthrough: settings.passthrough.clone(),
            outputs,
            startup: StartupSequencer::new(drive.start_phase_ticks),
            floor: drive.output_floor,
            start_output: drive.start_output,
            configured: settings.control_config,
            config: AtomicU8::new(ThermalControlConfig::NotConfigured.to_raw()),
            command: AtomicU32::new(initial_command.to_bits()),
        })
    }

    /// Mark the controller installed and apply the configured control state
    pub fn install(&self) {
        self.set_control_config(self.configured);
        info!("Thermal controller installed ({:?})", self.configured);
    }

    pub fn control_config(&self) -> ThermalControlConfig {
        ThermalControlConfig::from_raw(self.config.load(Ordering::Acquire))
    }

    pub fn set_control_config(&self, config: ThermalControlConfig) {
        self.config.store(config.to_raw(), Ordering::Release);
    }

    // ========================================================================
    // Loop table
    // ========================================================================

    pub fn loop_count(&self) -> usize {
        self.outputs.len()
    }

    /// Copy of the loop table
    pub fn loops(&self) -> Vec<ControlLoop> {
        self.loops.read().clone()
    }

    /// Copy of one closed loop
    pub fn control_loop(&self, id: LoopId) -> Option<ControlLoop> {
        self.loops.read().iter().find(|l| l.id == id).cloned()
    }

    pub fn passthrough(&self) -> &[PassthroughControl] {
        &self.passthrough
    }

    pub fn passthrough_control(&self, id: LoopId) -> Option<&PassthroughControl> {
        self.passthrough.iter().find(|p| p.id == id)
    }

    /// Include or exclude a loop from arbitration
    pub fn set_loop_enabled(&self, id: LoopId, enabled: bool) -> Result<()> {
        let mut loops = self.loops.write();
        let control = loops
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(ThermalError::NotFound(id.0))?;
        if control.enabled != enabled {
            info!(
                "CONTROL: loop '{}' {}",
                control.name,
                if enabled { "enabled" } else { "disabled" }
            );
            control.enabled = enabled;
        }
        Ok(())
    }

    // ========================================================================
    // Output Table
    // ========================================================================

    /// Write a loop output computed outside [`step_loops`](Self::step_loops)
    ///
    /// Non-finite values are rejected; others are clamped to the loop's
    /// output bound. Returns the value stored.
    pub fn record_output(&self, id: LoopId, value: f32) -> Result<f32> {
        let control = self.control_loop(id).ok_or(ThermalError::NotFound(id.0))?;
        let bounded = control.bound_output(value)?;
        self.outputs.write(control.slot(), bounded)?;
        Ok(bounded)
    }

    pub fn loop_output(&self, id: LoopId) -> Option<f32> {
        self.outputs.read(id.index())
    }

    pub fn outputs(&self) -> Vec<f32> {
        self.outputs.snapshot()
    }

    /// Let every due loop compute and write its slot
    pub fn step_loops(&self, sensors: &dyn SensorSource, stepper: &dyn PidStep) -> StepReport {
        let loops = self.loops();
        self.scheduler.run(&loops, sensors, stepper, &self.outputs)
    }

    // ========================================================================
    // Drive tick
    // ========================================================================

    pub fn startup_phase(&self) -> StartupPhase {
        self.startup.phase()
    }

    /// Compute this tick's fan command and publish it
    ///
    /// While the startup countdown runs the command is the fixed startup
    /// output and arbitration is skipped.
    pub fn tick(&self) -> TickOutcome {
        let phase = self.startup.tick();
        let command = match phase {
            StartupPhase::Starting => {
                if self.startup.remaining() == 0 {
                    info!("Startup phase complete, arbitration takes over next tick");
                }
                self.start_output
            }
            StartupPhase::Normal => self.arbitrate(),
        };

        self.command.store(command.to_bits(), Ordering::Release);
        debug!("DRIVE: {:?} command {:.2}", phase, command);
        TickOutcome { phase, command }
    }

    /// Run one tick and write the command to the fan duty actuator
    pub fn drive_tick(&self, actuator: &dyn Actuator) -> Result<TickOutcome> {
        let outcome = self.tick();
        actuator.write(SensorId::FanDuty, outcome.command)?;
        Ok(outcome)
    }

    /// Max-of-enabled over the current Output Table
    pub fn arbitrate(&self) -> f32 {
        let outputs = self.outputs.snapshot();
        let enabled: Vec<bool> = {
            let loops = self.loops.read();
            let mut mask = vec![false; outputs.len()];
            for control in loops.iter() {
                if let Some(slot) = mask.get_mut(control.slot()) {
                    *slot = control.enabled;
                }
            }
            mask
        };
        arbitrate(&outputs, &enabled, self.floor)
    }

    /// Last command issued by [`tick`](Self::tick)
    ///
    /// Before the first tick this is the startup output, or the floor when
    /// there is no startup phase.
    pub fn aggregated_output(&self) -> f32 {
        f32::from_bits(self.command.load(Ordering::Acquire))
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }
}
