//! Validation of control loop tables and settings files
//!
//! Everything here runs once at initialization. A violation is reported as
//! `ConfigurationInvalid` and must keep the controller from starting.

use std::collections::HashSet;
use std::path::Path;

use crate::constants::limits;
use crate::data::types::{Clamp, ControlLoop, LoopInput, PassthroughControl};
use smc_error::{Result, ThermalError};

/// Validates that a clamp is finite and ordered
pub fn validate_clamp(field: &str, clamp: &Clamp) -> Result<()> {
    if !clamp.is_ordered() {
        return Err(ThermalError::configuration(
            field,
            format!("min {} must not exceed max {}", clamp.min, clamp.max),
        ));
    }
    Ok(())
}

/// Validates a control name for display and lookup
pub fn validate_control_name(field: &str, name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ThermalError::configuration(field, "name cannot be empty"));
    }
    if trimmed.len() > limits::MAX_NAME_LEN {
        return Err(ThermalError::configuration(
            field,
            format!("name exceeds {} characters", limits::MAX_NAME_LEN),
        ));
    }
    Ok(())
}

fn validate_finite(field: &str, value: f32) -> Result<()> {
    if !value.is_finite() {
        return Err(ThermalError::configuration(field, "value must be finite"));
    }
    Ok(())
}

/// Validates one closed loop descriptor
pub fn validate_loop(control: &ControlLoop) -> Result<()> {
    let prefix = format!("loops[{}]", control.id);
    validate_control_name(&format!("{}.name", prefix), &control.name)?;

    if control.period_ticks == 0 || control.period_ticks > limits::MAX_PERIOD_TICKS {
        return Err(ThermalError::configuration(
            format!("{}.period_ticks", prefix),
            format!("must be within 1..={}", limits::MAX_PERIOD_TICKS),
        ));
    }

    let t = &control.tuning;
    validate_finite(&format!("{}.tuning.setpoint", prefix), t.setpoint)?;
    validate_finite(&format!("{}.tuning.kp", prefix), t.kp)?;
    validate_finite(&format!("{}.tuning.ki", prefix), t.ki)?;
    validate_finite(&format!("{}.tuning.kd", prefix), t.kd)?;
    validate_clamp(&format!("{}.tuning.integral", prefix), &t.integral)?;
    validate_clamp(&format!("{}.tuning.output", prefix), &t.output)?;

    if !(t.deadband.is_finite() && t.deadband >= 0.0) {
        return Err(ThermalError::configuration(
            format!("{}.tuning.deadband", prefix),
            "must be a non-negative number",
        ));
    }
    for (dir, rate) in [("positive", t.slew.positive), ("negative", t.slew.negative)] {
        if !(rate.is_finite() && rate >= 0.0) {
            return Err(ThermalError::configuration(
                format!("{}.tuning.slew.{}", prefix, dir),
                "must be a non-negative number",
            ));
        }
    }

    if let LoopInput::Average(sensors) = &control.input {
        if sensors.is_empty() {
            return Err(ThermalError::configuration(
                format!("{}.input", prefix),
                "average input needs at least one sensor",
            ));
        }
    }

    Ok(())
}

/// Validates the full loop table against the arbitration bounds
///
/// Closed loop ids must be `0..n` so each id addresses its Output Table slot,
/// passthrough ids must not collide with them, and `floor` must sit strictly
/// below every loop's minimum output.
pub fn validate_loop_set(
    loops: &[ControlLoop],
    passthrough: &[PassthroughControl],
    floor: f32,
    output_max: f32,
) -> Result<()> {
    validate_finite("output_floor", floor)?;
    validate_finite("output_max", output_max)?;
    if floor >= output_max {
        return Err(ThermalError::configuration(
            "output_floor",
            format!("floor {} must be below output_max {}", floor, output_max),
        ));
    }

    if loops.len() > limits::MAX_LOOPS {
        return Err(ThermalError::configuration(
            "loops",
            format!("at most {} closed loops are supported", limits::MAX_LOOPS),
        ));
    }

    for (slot, control) in loops.iter().enumerate() {
        if control.slot() != slot {
            return Err(ThermalError::configuration(
                format!("loops[{}].id", slot),
                format!("closed loop ids must be contiguous from 0 (found {})", control.id),
            ));
        }
        validate_loop(control)?;

        let out = &control.tuning.output;
        if out.min <= floor {
            return Err(ThermalError::configuration(
                format!("loops[{}].tuning.output.min", slot),
                format!("{} must be above the arbitration floor {}", out.min, floor),
            ));
        }
        if out.max > output_max {
            return Err(ThermalError::configuration(
                format!("loops[{}].tuning.output.max", slot),
                format!("{} exceeds output_max {}", out.max, output_max),
            ));
        }
    }

    let mut seen: HashSet<u16> = loops.iter().map(|l| l.id.0).collect();
    for control in passthrough {
        validate_control_name(&format!("passthrough[{}].name", control.id), &control.name)?;
        if !seen.insert(control.id.0) {
            return Err(ThermalError::configuration(
                format!("passthrough[{}].id", control.id),
                "id already used by another control",
            ));
        }
    }

    Ok(())
}

/// Validates settings file size before it is read
pub fn validate_file_size(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)?;
    if metadata.len() > limits::MAX_SETTINGS_SIZE {
        return Err(ThermalError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size: limits::MAX_SETTINGS_SIZE,
        });
    }
    Ok(())
}
