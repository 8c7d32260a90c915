//! Unified error handling for the SMC thermal controller
//!
//! Every crate in the workspace reports failures through [`ThermalError`].
//! Accessor errors are returned to the caller, per-tick input failures are
//! absorbed by the scheduler and initialization failures abort setup.

use std::io;
use std::path::PathBuf;

/// Result type alias using ThermalError
pub type Result<T> = std::result::Result<T, ThermalError>;

/// Unified error type for all thermal control operations
#[derive(thiserror::Error, Debug)]
pub enum ThermalError {
    // ============================================================================
    // Accessor Errors
    // ============================================================================
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Control loop not found: {0}")]
    NotFound(u16),

    // ============================================================================
    // Collaborator Errors
    // ============================================================================
    #[error("Input unavailable for sensor {sensor}: {reason}")]
    InputUnavailable {
        sensor: String,
        reason: String,
    },

    #[error("Failed to write actuator {actuator}: {reason}")]
    ActuatorWrite {
        actuator: String,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Invalid configuration for {field}: {reason}")]
    ConfigurationInvalid {
        field: String,
        reason: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("File too large: {path} ({size} bytes, max {max_size} bytes)")]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ThermalError {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration invariant error
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigurationInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an input unavailable error
    pub fn input_unavailable(sensor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputUnavailable {
            sensor: sensor.into(),
            reason: reason.into(),
        }
    }

    /// Create an actuator write error
    pub fn actuator(actuator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActuatorWrite {
            actuator: actuator.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error must stop the controller from starting
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigurationInvalid { .. } | Self::JsonParse(_) | Self::FileTooLarge { .. }
        )
    }
}
