//! PID step seam and the reference stepper
//!
//! The controller treats the per-loop PID computation as opaque: given a
//! loop and its process value it gets back one bounded output. Anything
//! implementing [`PidStep`] can be plugged in. [`DiscretePid`] is the
//! stepper the daemon uses.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::data::{ControlLoop, LoopId, TuningParams};

/// One computation step of a loop's PID
#[cfg_attr(test, mockall::automock)]
pub trait PidStep: Send + Sync {
    /// Produce the loop's next output for `process_value`
    ///
    /// The result must already lie within the loop's output clamp.
    fn step(&self, control: &ControlLoop, process_value: f32) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PidState {
    integral: f32,
    prev_error: Option<f32>,
    prev_output: Option<f32>,
}

impl PidState {
    fn new(tuning: &TuningParams) -> Self {
        Self {
            integral: tuning.integral.min,
            prev_error: None,
            prev_output: None,
        }
    }
}

/// Discrete positional PID with integral clamp, deadband and slew limits
///
/// State is kept per loop id. The sample time of a loop is its period in
/// ticks times the drive tick.
#[derive(Debug)]
pub struct DiscretePid {
    tick: Duration,
    states: Mutex<HashMap<LoopId, PidState>>,
}

impl DiscretePid {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Forget the accumulated state of a loop
    pub fn reset(&self, id: LoopId) {
        self.states.lock().remove(&id);
    }

    fn sample_time(&self, control: &ControlLoop) -> f32 {
        self.tick.as_secs_f32() * control.period_ticks.max(1) as f32
    }
}

impl PidStep for DiscretePid {
    fn step(&self, control: &ControlLoop, process_value: f32) -> f32 {
        let tuning = &control.tuning;
        let ts = self.sample_time(control);

        let mut states = self.states.lock();
        let state = states
            .entry(control.id)
            .or_insert_with(|| PidState::new(tuning));

        let mut error = tuning.setpoint - process_value;
        if error.abs() <= tuning.deadband {
            error = 0.0;
        }

        let p = tuning.kp * error;
        state.integral = tuning.integral.apply(state.integral + tuning.ki * error * ts);
        let d = match state.prev_error {
            Some(prev) if ts > 0.0 => tuning.kd * (error - prev) / ts,
            _ => 0.0,
        };
        state.prev_error = Some(error);

        let mut output = tuning.output.apply(p + state.integral + d);

        if let Some(prev) = state.prev_output {
            let delta = output - prev;
            if tuning.slew.positive > 0.0 && delta > tuning.slew.positive * ts {
                output = prev + tuning.slew.positive * ts;
            } else if tuning.slew.negative > 0.0 && -delta > tuning.slew.negative * ts {
                output = prev - tuning.slew.negative * ts;
            }
            output = tuning.output.apply(output);
        }
        state.prev_output = Some(output);

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{default_tray_loops, SlewLimits, LOOP_VR};

    fn vr_loop() -> ControlLoop {
        default_tray_loops()
            .into_iter()
            .find(|l| l.id == LOOP_VR)
            .unwrap()
    }

    #[test]
    fn test_cool_tray_sits_at_minimum() {
        let pid = DiscretePid::new(Duration::from_secs(1));
        let control = vr_loop();
        for _ in 0..10 {
            assert_eq!(pid.step(&control, 33.0), 20.0);
        }
    }

    #[test]
    fn test_hot_tray_ramps_output() {
        let pid = DiscretePid::new(Duration::from_secs(1));
        let control = vr_loop();
        let first = pid.step(&control, 100.0);
        let second = pid.step(&control, 100.0);
        assert!(first > 20.0);
        assert!(second > first, "integral should keep raising output");
        for _ in 0..1000 {
            pid.step(&control, 100.0);
        }
        assert_eq!(pid.step(&control, 100.0), 90.0);
    }

    #[test]
    fn test_deadband_suppresses_error() {
        let pid = DiscretePid::new(Duration::from_secs(1));
        let mut control = vr_loop();
        control.tuning.deadband = 5.0;
        assert_eq!(pid.step(&control, 69.0), 20.0);
    }

    #[test]
    fn test_slew_limit_bounds_rise() {
        let pid = DiscretePid::new(Duration::from_secs(1));
        let mut control = vr_loop();
        control.tuning.slew = SlewLimits {
            positive: 2.0,
            negative: 0.0,
        };
        let first = pid.step(&control, 66.0);
        let second = pid.step(&control, 200.0);
        assert!((second - first - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_reset_restarts_integral() {
        let pid = DiscretePid::new(Duration::from_secs(1));
        let control = vr_loop();
        for _ in 0..50 {
            pid.step(&control, 100.0);
        }
        pid.reset(control.id);
        let after_reset = pid.step(&control, 66.0);
        assert_eq!(after_reset, 20.0);
    }
}
