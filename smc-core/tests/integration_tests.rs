/*
 * Integration tests for the SMC thermal core
 *
 * These drive the controller through its public surface the way the
 * daemon does: step loops, run the drive tick, inspect runtime info.
 */

use std::sync::Arc;
use std::time::Duration;

use smc_core::{
    Clamp, ControlLoop, ControlMode, ControlRuntimeInfo, DiscretePid, LoopId, LoopInput,
    PidStep, RuntimeInfoAccessor, SensorId, SensorSource, StartupPhase, ThermalController,
    ThermalError, ThermalSettings, TuningParams, SlewLimits, CONTROL_FAN, LOOP_HDD, LOOP_VR,
};
use smc_core::constants::output;
use smc_core::sensors::tray_sensor_table;

// Test utilities
fn scenario_loop(id: u16, name: &str, enabled: bool) -> ControlLoop {
    ControlLoop {
        id: LoopId(id),
        name: name.to_string(),
        enabled,
        mode: ControlMode::Automatic,
        period_ticks: 1,
        tuning: TuningParams {
            setpoint: 50.0,
            kp: -1.0,
            ki: 0.0,
            kd: 0.0,
            integral: Clamp::new(20.0, 90.0),
            output: Clamp::new(20.0, 90.0),
            slew: SlewLimits::default(),
            deadband: 0.0,
        },
        input: LoopInput::Sensor(SensorId::TrayTemp),
    }
}

fn scenario_settings(start_ticks: u32) -> ThermalSettings {
    let mut settings = ThermalSettings::default();
    settings.drive.start_phase_ticks = start_ticks;
    settings.loops = vec![scenario_loop(0, "A", false), scenario_loop(1, "B", true)];
    settings
}

/// Stepper that always produces the same output per loop
struct FixedOutputs(Vec<f32>);

impl PidStep for FixedOutputs {
    fn step(&self, control: &ControlLoop, _process_value: f32) -> f32 {
        self.0[control.slot()]
    }
}

fn accessor_for(controller: &Arc<ThermalController>) -> RuntimeInfoAccessor {
    let sensors: Arc<dyn SensorSource> = Arc::new(tray_sensor_table());
    RuntimeInfoAccessor::new(controller.clone(), sensors)
}

#[test]
fn test_scenario_max_of_enabled() {
    let controller = ThermalController::new(&scenario_settings(0)).unwrap();
    let sensors = tray_sensor_table();

    controller.step_loops(&sensors, &FixedOutputs(vec![80.0, 55.0]));
    // A is disabled and never stepped
    assert_eq!(controller.loop_output(LoopId(0)), Some(20.0));
    assert_eq!(controller.loop_output(LoopId(1)), Some(55.0));

    let outcome = controller.drive_tick(&sensors).unwrap();
    assert_eq!(outcome.command, 55.0);
    assert_eq!(sensors.read(SensorId::FanDuty).unwrap(), 55.0);
}

#[test]
fn test_scenario_all_disabled_gives_floor() {
    let controller = ThermalController::new(&scenario_settings(0)).unwrap();
    controller.record_output(LoopId(1), 55.0).unwrap();
    controller.set_loop_enabled(LoopId(1), false).unwrap();

    let outcome = controller.tick();
    assert!((outcome.command - 19.99).abs() < 1e-4);
    assert!(outcome.command < output::LOOP_MIN);
    // Disabled entries stay readable
    assert_eq!(controller.loop_output(LoopId(1)), Some(55.0));
}

#[test]
fn test_scenario_startup_override() {
    let controller = ThermalController::new(&scenario_settings(3)).unwrap();
    let sensors = tray_sensor_table();
    let stepper = FixedOutputs(vec![80.0, 55.0]);

    let mut commands = Vec::new();
    for _ in 0..5 {
        // Loops keep computing during startup
        controller.step_loops(&sensors, &stepper);
        commands.push(controller.drive_tick(&sensors).unwrap());
    }

    for outcome in &commands[..3] {
        assert_eq!(outcome.phase, StartupPhase::Starting);
        assert_eq!(outcome.command, 60.0);
    }
    for outcome in &commands[3..] {
        assert_eq!(outcome.phase, StartupPhase::Normal);
        assert_eq!(outcome.command, 55.0);
    }
    assert_eq!(controller.aggregated_output(), 55.0);
}

#[test]
fn test_scenario_full_sequence() {
    let controller = ThermalController::new(&scenario_settings(3)).unwrap();
    let sensors = tray_sensor_table();
    controller.step_loops(&sensors, &FixedOutputs(vec![80.0, 55.0]));

    // A disabled, B enabled at 55.0
    assert_eq!(controller.arbitrate(), 55.0);

    // B disabled too: floor below every loop minimum
    controller.set_loop_enabled(LoopId(1), false).unwrap();
    let floor = controller.arbitrate();
    assert!((floor - 19.99).abs() < 1e-4);
    assert!(floor < output::LOOP_MIN);

    // B back on; startup of 3 ticks overrides arbitration
    controller.set_loop_enabled(LoopId(1), true).unwrap();
    for tick in 1..=3 {
        let outcome = controller.drive_tick(&sensors).unwrap();
        assert_eq!(outcome.phase, StartupPhase::Starting, "tick {}", tick);
        assert_eq!(outcome.command, 60.0, "tick {}", tick);
    }

    let fourth = controller.drive_tick(&sensors).unwrap();
    assert_eq!(fourth.phase, StartupPhase::Normal);
    assert_eq!(fourth.command, 55.0);
    assert_eq!(controller.aggregated_output(), 55.0);
}

#[test]
fn test_runtime_info_is_idempotent() {
    let controller = Arc::new(ThermalController::new(&ThermalSettings::default()).unwrap());
    controller.install();
    let accessor = accessor_for(&controller);

    let first = accessor.get_runtime_info(LOOP_HDD).unwrap();
    let second = accessor.get_runtime_info(LOOP_HDD).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unknown_control_is_not_found() {
    let controller = Arc::new(ThermalController::new(&ThermalSettings::default()).unwrap());
    let accessor = accessor_for(&controller);

    let mut info = ControlRuntimeInfo::default();
    assert!(matches!(
        accessor.get_runtime_info(LoopId(7)),
        Err(ThermalError::NotFound(7))
    ));
    assert!(matches!(
        accessor.read_runtime_info_into(LoopId(7), Some(&mut info)),
        Err(ThermalError::NotFound(7))
    ));
}

#[test]
fn test_absent_gain_differs_from_zero_gain() {
    let controller = Arc::new(ThermalController::new(&ThermalSettings::default()).unwrap());
    controller.install();
    let accessor = accessor_for(&controller);

    // The VR loop has a real derivative gain of zero
    let vr = accessor.get_runtime_info(LOOP_VR).unwrap();
    assert_eq!(vr.d_coeff, Some(0.0));

    // The fan control has no gains at all
    let fan = accessor.get_runtime_info(CONTROL_FAN).unwrap();
    assert_eq!(fan.p_coeff, None);
    assert_eq!(fan.i_coeff, None);
    assert_eq!(fan.d_coeff, None);
}

#[test]
fn test_tray_defaults_run_with_reference_pid() {
    let controller = ThermalController::new(&ThermalSettings::default()).unwrap();
    controller.install();
    let sensors = tray_sensor_table();
    let pid = DiscretePid::new(Duration::from_secs(1));

    let start_ticks = ThermalSettings::default().drive.start_phase_ticks;
    for _ in 0..start_ticks {
        controller.step_loops(&sensors, &pid);
        assert_eq!(controller.drive_tick(&sensors).unwrap().command, 60.0);
    }

    // A cool, idle tray settles at the loop minimum
    controller.step_loops(&sensors, &pid);
    let outcome = controller.drive_tick(&sensors).unwrap();
    assert_eq!(outcome.phase, StartupPhase::Normal);
    assert_eq!(outcome.command, output::LOOP_MIN);
}
