//! Drive loop
//!
//! Once per drive tick: let due loops compute, then arbitrate and write the
//! fan command. Input failures are absorbed inside the controller; actuator
//! failures are counted here and logged with backoff so a dead fan driver
//! does not flood the journal.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use smc_core::constants::limits::MAX_CONSECUTIVE_ERRORS;
use smc_core::{Actuator, PidStep, SensorSource, StartupPhase, ThermalController, TickOutcome};
use smc_error::Result;

/// Shared state of the drive loop
pub struct DriveState {
    /// Drive tick in milliseconds
    pub tick_ms: AtomicU64,
    /// Set once shutdown has been requested
    pub shutdown: AtomicBool,
    /// Wakes the loop out of its tick sleep on shutdown
    pub shutdown_notify: Notify,
    /// Ticks completed since start
    pub ticks: AtomicU64,
    /// Actuator failures since the last successful write
    pub consecutive_failures: AtomicU32,
}

impl DriveState {
    pub fn new(tick_ms: u64) -> Self {
        Self {
            tick_ms: AtomicU64::new(tick_ms),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            ticks: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Collaborators the drive loop works with
pub struct DriveContext {
    pub controller: Arc<ThermalController>,
    pub sensors: Arc<dyn SensorSource>,
    pub actuator: Arc<dyn Actuator>,
    pub pid: Arc<dyn PidStep>,
}

/// Run one drive tick
pub fn process_tick(ctx: &DriveContext) -> Result<TickOutcome> {
    let report = ctx.controller.step_loops(ctx.sensors.as_ref(), ctx.pid.as_ref());
    if report.input_failures > 0 {
        debug!("CONTROL: {} loop(s) kept their last output", report.input_failures);
    }
    ctx.controller.drive_tick(ctx.actuator.as_ref())
}

/// Run the drive loop until shutdown is requested
pub async fn run_control_loop(state: Arc<DriveState>, ctx: DriveContext) {
    info!(
        "Drive loop starting ({} ms tick, {:?})",
        state.tick_ms.load(Ordering::SeqCst),
        ctx.controller.startup_phase()
    );

    let mut last_phase = ctx.controller.startup_phase();

    loop {
        if state.is_shutdown() {
            info!("Drive loop shutting down");
            break;
        }

        match process_tick(&ctx) {
            Ok(outcome) => {
                let failures = state.consecutive_failures.swap(0, Ordering::SeqCst);
                if failures > 0 {
                    info!("ACTION: Fan actuator recovered after {} failed writes", failures);
                }
                if outcome.phase != last_phase {
                    info!("CONTROL: Entered {:?} phase", outcome.phase);
                    last_phase = outcome.phase;
                }
                if outcome.phase == StartupPhase::Normal {
                    debug!("ACTION: Fan duty {:.2}", outcome.command);
                }
            }
            Err(e) => {
                let failures = state.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures == 1 || failures % MAX_CONSECUTIVE_ERRORS == 0 {
                    error!("Drive tick failed (count: {}): {}", failures, e);
                }
                if failures == MAX_CONSECUTIVE_ERRORS {
                    warn!("Fan actuator unresponsive for {} ticks", failures);
                }
            }
        }
        state.ticks.fetch_add(1, Ordering::SeqCst);

        let tick_ms = state.tick_ms.load(Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(tick_ms)) => {}
            _ = state.shutdown_notify.notified() => {
                debug!("Drive loop woken up by shutdown request");
            }
        }
    }

    info!(
        "Drive loop stopped after {} ticks, last command {:.2}",
        state.ticks.load(Ordering::SeqCst),
        ctx.controller.aggregated_output()
    );
}
