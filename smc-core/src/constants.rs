//! Constants and configuration values for the tray thermal controller
//!
//! Centralizes the fan output bounds, startup phase parameters and limits.
//! Settings files may override most of these; the values here are the
//! defaults the tray ships with.

/// Filesystem locations
pub mod paths {
    /// Configuration directory
    pub const CONFIG_DIR: &str = "/etc/smc-thermal";

    /// Thermal settings file inside `CONFIG_DIR`
    pub const SETTINGS_FILE: &str = "thermal.json";

    /// Default settings path
    pub fn default_settings_path() -> std::path::PathBuf {
        std::path::Path::new(CONFIG_DIR).join(SETTINGS_FILE)
    }
}

/// Fan output bounds shared by every closed loop
pub mod output {
    /// Minimum output a PID loop may produce (percent duty)
    pub const LOOP_MIN: f32 = 20.0;

    /// Maximum output a PID loop may produce (percent duty)
    pub const LOOP_MAX: f32 = 90.0;

    /// Command issued when no loop is enabled.
    /// Sits just below `LOOP_MIN` so "no demand" is distinguishable from
    /// "minimum demand".
    pub const FLOOR: f32 = LOOP_MIN - 0.01;

    /// Integral accumulator bounds
    pub const INTEGRAL_MIN: f32 = LOOP_MIN;
    pub const INTEGRAL_MAX: f32 = LOOP_MAX;
}

/// Startup phase parameters
pub mod startup {
    /// Fan duty forced while the startup phase is active
    pub const OUTPUT: f32 = 60.0;

    /// Startup phase length in drive ticks (one minute at the default tick)
    pub const DURATION_TICKS: u32 = 60;
}

/// Fan duty actuator range
pub mod fan {
    /// Lowest duty accepted by the PWM driver (percent)
    pub const MIN_DUTY: f32 = 0.0;

    /// Highest duty accepted by the PWM driver (percent)
    pub const MAX_DUTY: f32 = 100.0;

    /// Duty the fan runs at before the controller first writes it
    pub const DEFAULT_DUTY: f32 = 65.0;
}

/// Timing constants for the drive loop
pub mod timing {
    /// Drive tick in milliseconds (settings default)
    pub const DRIVE_TICK_MS: u64 = 1000;

    /// Shortest drive tick the daemon accepts
    pub const MIN_DRIVE_TICK_MS: u64 = 50;
}

/// Limits for configuration files and tables
pub mod limits {
    /// Maximum settings file size (64KB)
    pub const MAX_SETTINGS_SIZE: u64 = 64 * 1024;

    /// Maximum number of closed control loops
    pub const MAX_LOOPS: usize = 16;

    /// Maximum control name length
    pub const MAX_NAME_LEN: usize = 32;

    /// Maximum loop period in ticks (one hour at the default tick)
    pub const MAX_PERIOD_TICKS: u32 = 3600;

    /// Consecutive actuator failures before the daemon escalates logging
    pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;
}
