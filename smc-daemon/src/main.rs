//! SMC Thermal Daemon (smc-thermald)
//!
//! Runs the storage-tray thermal controller: loads the settings, builds
//! the sensor table and the controller, and drives the fan once per tick
//! until SIGINT/SIGTERM.

mod control_loop;

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use smc_core::constants::paths;
use smc_core::{
    load_settings, tray_sensor_table, DiscretePid, RuntimeInfoAccessor, SensorSource,
    ThermalController,
};
use smc_protocol::{Request, Response, ResponseData};

use control_loop::{DriveContext, DriveState};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CLI
// ============================================================================

struct Options {
    config_path: PathBuf,
    status_only: bool,
}

enum Command {
    Run(Options),
    Exit,
}

fn print_help() {
    eprintln!("smc-thermald {} - Storage tray thermal control daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    smc-thermald [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Settings file (default {})", paths::default_settings_path().display());
    eprintln!("    -s, --status        Print control runtime info as JSON and exit");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    SMC_LOG             Log filter (trace, debug, info, warn, error)");
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut options = Options {
        config_path: paths::default_settings_path(),
        status_only: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(Command::Exit);
            }
            "-v" | "--version" => {
                println!("smc-thermald {}", VERSION);
                return Ok(Command::Exit);
            }
            "-s" | "--status" => options.status_only = true,
            "-c" | "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| anyhow::anyhow!("--config requires a path argument"))?;
                options.config_path = PathBuf::from(path);
            }
            arg => {
                print_help();
                anyhow::bail!("Unknown argument: {}", arg);
            }
        }
        i += 1;
    }

    Ok(Command::Run(options))
}

// ============================================================================
// Logging
// ============================================================================

/// Install the tracing subscriber, preferring the systemd journal
fn init_logging() -> bool {
    let log_level = std::env::var("SMC_LOG").unwrap_or_else(|_| "info".to_string());

    let mut use_journald = std::path::Path::new("/run/systemd/journal/socket").exists();
    if use_journald {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(&log_level))
                    .init();
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
                use_journald = false;
            }
        }
    }

    if !use_journald {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_level(true)
            .with_env_filter(&log_level)
            .init();
    }

    use_journald
}

// ============================================================================
// Status
// ============================================================================

fn print_status(accessor: &RuntimeInfoAccessor) -> anyhow::Result<()> {
    let mut report = serde_json::Map::new();

    let controls = match accessor.handle(&Request::ListControls) {
        Response::Ok(ResponseData::Controls { controls }) => controls,
        other => anyhow::bail!("Unexpected response to ListControls: {:?}", other),
    };

    for control in &controls {
        let response = accessor.handle(&Request::GetControlRuntimeInfo { id: control.id });
        report.insert(control.name.clone(), serde_json::to_value(&response)?);
    }
    report.insert(
        "fan_command".to_string(),
        serde_json::to_value(accessor.handle(&Request::GetFanCommand))?,
    );

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let options = match parse_args(&args)? {
        Command::Run(options) => options,
        Command::Exit => return Ok(()),
    };

    let use_journald = init_logging();
    info!("STARTUP: smc-thermald {} starting", VERSION);
    info!("STARTUP: Logging to {}", if use_journald { "systemd journal" } else { "stdout" });

    let settings = load_settings(&options.config_path)
        .with_context(|| format!("Failed to load settings from {}", options.config_path.display()))?;

    let controller = Arc::new(ThermalController::new(&settings).context("Invalid thermal settings")?);
    let sensors = Arc::new(tray_sensor_table());
    controller.install();

    let accessor = RuntimeInfoAccessor::new(controller.clone(), sensors.clone() as Arc<dyn SensorSource>);
    if options.status_only {
        return print_status(&accessor);
    }

    for control in controller.loops() {
        let info = accessor.get_runtime_info(control.id)?;
        info!(
            "STARTUP: Loop '{}' setpoint {:.1} kp {:?} ki {:?} ({:?})",
            control.name, info.setpoint, info.p_coeff, info.i_coeff, info.mode
        );
    }

    let tick = Duration::from_millis(settings.drive.tick_interval_ms);
    let state = Arc::new(DriveState::new(settings.drive.tick_interval_ms));

    let signal_state = state.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
        signal_state.request_shutdown();
    }) {
        warn!("Failed to set signal handler: {}. Shutdown via signals may not work cleanly.", e);
    }

    let ctx = DriveContext {
        controller: controller.clone(),
        sensors: sensors.clone(),
        actuator: sensors,
        pid: Arc::new(DiscretePid::new(tick)),
    };
    control_loop::run_control_loop(state, ctx).await;

    info!(
        "SHUTDOWN: Daemon terminated, last fan command {:.2}",
        accessor.aggregated_output()
    );
    Ok(())
}
