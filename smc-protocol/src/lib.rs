//! Shared runtime-info types for the SMC thermal controller
//!
//! These are the values exchanged across the introspection surface: the
//! per-control runtime info, configuration updates and the request/response
//! pair used to dispatch them in-process. Encoding onto the management
//! protocol happens elsewhere.

use serde::{Deserialize, Serialize};

/// Largest accepted magnitude for any tunable in a configuration update
const MAX_TUNABLE_MAGNITUDE: f32 = 1000.0;

/// Externally visible operating mode of a control
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// The control loop drives its output from its input
    Automatic,
    /// The control loop output is not computed automatically
    Manual,
}

/// Runtime view of one control resource
///
/// Gain fields are `None` for controls that have no user-tunable gains,
/// which keeps "no gain" distinct from "gain of zero".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ControlRuntimeInfo {
    pub mode: ControlMode,
    pub setpoint: f32,
    pub p_coeff: Option<f32>,
    pub i_coeff: Option<f32>,
    pub d_coeff: Option<f32>,
}

impl Default for ControlRuntimeInfo {
    fn default() -> Self {
        Self {
            mode: ControlMode::Automatic,
            setpoint: 0.0,
            p_coeff: None,
            i_coeff: None,
            d_coeff: None,
        }
    }
}

impl ControlRuntimeInfo {
    /// Whether this control reports tunable gains
    pub fn has_gains(&self) -> bool {
        self.p_coeff.is_some() || self.i_coeff.is_some() || self.d_coeff.is_some()
    }
}

/// Requested update to a control's tunables
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ControlConfigParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ControlMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setpoint: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_coeff: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i_coeff: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_coeff: Option<f32>,
}

impl ControlConfigParams {
    /// Validate the numeric fields of an update
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("setpoint", self.setpoint),
            ("p_coeff", self.p_coeff),
            ("i_coeff", self.i_coeff),
            ("d_coeff", self.d_coeff),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(format!("{} must be finite", name));
                }
                if v.abs() > MAX_TUNABLE_MAGNITUDE {
                    return Err(format!(
                        "{} out of range (|{}| > {})",
                        name, v, MAX_TUNABLE_MAGNITUDE
                    ));
                }
            }
        }
        Ok(())
    }

    /// Whether the update carries no changes at all
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.setpoint.is_none()
            && self.p_coeff.is_none()
            && self.i_coeff.is_none()
            && self.d_coeff.is_none()
    }
}

/// Outcome of a configuration update
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConfigAck {
    Accepted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd", content = "data")]
pub enum Request {
    GetControlRuntimeInfo { id: u16 },
    SetControlRuntimeConfig { id: u16, params: ControlConfigParams },
    GetFanCommand,
    ListControls,
}

impl Request {
    /// Validate request parameters before dispatch
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::GetControlRuntimeInfo { .. } | Request::GetFanCommand | Request::ListControls => {
                Ok(())
            }
            Request::SetControlRuntimeConfig { params, .. } => params.validate(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::GetControlRuntimeInfo { .. } => "GetControlRuntimeInfo",
            Request::SetControlRuntimeConfig { .. } => "SetControlRuntimeConfig",
            Request::GetFanCommand => "GetFanCommand",
            Request::ListControls => "ListControls",
        }
    }
}

/// Summary of one registered control, as listed by `ListControls`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlSummary {
    pub id: u16,
    pub name: String,
    pub enabled: bool,
    pub closed_loop: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok(ResponseData),
    #[serde(rename = "error")]
    Error { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    InputUnavailable,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseData {
    RuntimeInfo(ControlRuntimeInfo),
    Ack { ack: ConfigAck },
    FanCommand { duty: f32 },
    Controls { controls: Vec<ControlSummary> },
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok(_))
    }
}
