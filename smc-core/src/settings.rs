//! Thermal controller settings
//!
//! Persistent settings stored as JSON, by default in
//! `/etc/smc-thermal/thermal.json`. A missing file means "use the tray
//! defaults"; a present file must parse and validate or startup is aborted.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::constants::{fan, output, startup, timing};
use crate::data::{
    default_passthrough, default_tray_loops, validate_file_size, validate_loop_set, ControlLoop,
    PassthroughControl, ThermalControlConfig,
};
use smc_error::{Result, ThermalError};

/// Thermal controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalSettings {
    /// Drive tick and arbitration bounds
    #[serde(default)]
    pub drive: DriveSettings,

    /// Control configuration state once the controller is installed
    #[serde(default = "default_control_config")]
    pub control_config: ThermalControlConfig,

    /// Closed loops, in Output Table slot order
    #[serde(default = "default_tray_loops")]
    pub loops: Vec<ControlLoop>,

    /// Controls exposed without tunable gains
    #[serde(default = "default_passthrough")]
    pub passthrough: Vec<PassthroughControl>,
}

/// Drive tick and arbitration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveSettings {
    /// Actuator-drive tick in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Startup phase length in ticks
    #[serde(default = "default_start_phase_ticks")]
    pub start_phase_ticks: u32,

    /// Fan duty forced during the startup phase
    #[serde(default = "default_start_output")]
    pub start_output: f32,

    /// Command issued when no loop is enabled
    #[serde(default = "default_output_floor")]
    pub output_floor: f32,

    /// Upper bound every loop output clamp must respect
    #[serde(default = "default_output_max")]
    pub output_max: f32,
}

fn default_control_config() -> ThermalControlConfig {
    ThermalControlConfig::Automatic
}

fn default_tick_interval_ms() -> u64 {
    timing::DRIVE_TICK_MS
}

fn default_start_phase_ticks() -> u32 {
    startup::DURATION_TICKS
}

fn default_start_output() -> f32 {
    startup::OUTPUT
}

fn default_output_floor() -> f32 {
    output::FLOOR
}

fn default_output_max() -> f32 {
    output::LOOP_MAX
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            start_phase_ticks: default_start_phase_ticks(),
            start_output: default_start_output(),
            output_floor: default_output_floor(),
            output_max: default_output_max(),
        }
    }
}

impl Default for ThermalSettings {
    fn default() -> Self {
        Self {
            drive: DriveSettings::default(),
            control_config: default_control_config(),
            loops: default_tray_loops(),
            passthrough: default_passthrough(),
        }
    }
}

impl ThermalSettings {
    /// Check every initialization invariant
    pub fn validate(&self) -> Result<()> {
        let drive = &self.drive;
        if drive.tick_interval_ms < timing::MIN_DRIVE_TICK_MS {
            return Err(ThermalError::configuration(
                "drive.tick_interval_ms",
                format!("must be at least {}ms", timing::MIN_DRIVE_TICK_MS),
            ));
        }
        if !(drive.start_output.is_finite()
            && (fan::MIN_DUTY..=fan::MAX_DUTY).contains(&drive.start_output))
        {
            return Err(ThermalError::configuration(
                "drive.start_output",
                format!("must be within {}..={}", fan::MIN_DUTY, fan::MAX_DUTY),
            ));
        }
        if drive.output_max > fan::MAX_DUTY || drive.output_floor < fan::MIN_DUTY {
            return Err(ThermalError::configuration(
                "drive",
                format!(
                    "arbitration bounds must lie within the fan range {}..={}",
                    fan::MIN_DUTY,
                    fan::MAX_DUTY
                ),
            ));
        }
        validate_loop_set(&self.loops, &self.passthrough, drive.output_floor, drive.output_max)
    }
}

/// Load and validate settings from `path`
pub fn load_settings(path: &Path) -> Result<ThermalSettings> {
    if !path.exists() {
        debug!("No settings file found at {:?}, using tray defaults", path);
        return Ok(ThermalSettings::default());
    }

    validate_file_size(path)?;
    let content = fs::read_to_string(path)?;
    let settings: ThermalSettings = serde_json::from_str(&content)?;
    settings.validate()?;

    info!(
        "Settings loaded from {:?}: {} closed loops, {} passthrough controls",
        path,
        settings.loops.len(),
        settings.passthrough.len()
    );
    Ok(settings)
}

/// Validate and atomically write settings to `path`
pub fn save_settings(path: &Path, settings: &ThermalSettings) -> Result<()> {
    settings.validate()?;
    let json = serde_json::to_string_pretty(settings)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    // Write to a temp file and rename so a crash never leaves a torn file
    let temp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    drop(file);
    fs::rename(&temp_path, path)?;

    debug!("Settings written to {:?}", path);
    Ok(())
}
