//! Runtime info accessor
//!
//! Read/write surface over the controller for management clients: live
//! setpoint, gains and mode of each control, and the aggregated fan
//! command. Configuration writes are accepted and ignored; the loop
//! tuning only changes through the settings file.

use std::sync::Arc;
use tracing::debug;

use smc_error::{Result, ThermalError};
use smc_protocol::{
    ConfigAck, ControlConfigParams, ControlRuntimeInfo, ControlSummary, ErrorKind,
    Request, Response, ResponseData,
};

use crate::data::LoopId;
use crate::engine::ThermalController;
use crate::sensors::SensorSource;

pub struct RuntimeInfoAccessor {
    controller: Arc<ThermalController>,
    sensors: Arc<dyn SensorSource>,
}

impl RuntimeInfoAccessor {
    pub fn new(controller: Arc<ThermalController>, sensors: Arc<dyn SensorSource>) -> Self {
        Self {
            controller,
            sensors,
        }
    }

    /// Live runtime info of a control
    ///
    /// Closed loops report their setpoint and gains. Passthrough controls
    /// report the reading of their sensor as setpoint and no gains.
    pub fn get_runtime_info(&self, id: LoopId) -> Result<ControlRuntimeInfo> {
        let config = self.controller.control_config();

        if let Some(control) = self.controller.control_loop(id) {
            let tuning = control.tuning;
            return Ok(ControlRuntimeInfo {
                mode: config.visible_mode(),
                setpoint: tuning.setpoint,
                p_coeff: Some(tuning.kp),
                i_coeff: Some(tuning.ki),
                d_coeff: Some(tuning.kd),
            });
        }

        if let Some(control) = self.controller.passthrough_control(id) {
            let setpoint = self.sensors.read(control.sensor)?;
            return Ok(ControlRuntimeInfo {
                mode: config.visible_mode(),
                setpoint,
                p_coeff: None,
                i_coeff: None,
                d_coeff: None,
            });
        }

        Err(ThermalError::NotFound(id.0))
    }

    /// Fill a caller-provided buffer with the runtime info of a control
    pub fn read_runtime_info_into(
        &self,
        id: LoopId,
        info: Option<&mut ControlRuntimeInfo>,
    ) -> Result<()> {
        let info = info.ok_or_else(|| ThermalError::invalid_argument("no output buffer"))?;
        *info = self.get_runtime_info(id)?;
        Ok(())
    }

    /// Accept a configuration update without applying it
    pub fn set_runtime_config(
        &self,
        id: LoopId,
        params: &ControlConfigParams,
    ) -> Result<ConfigAck> {
        if self.controller.control_loop(id).is_none()
            && self.controller.passthrough_control(id).is_none()
        {
            return Err(ThermalError::NotFound(id.0));
        }
        params.validate().map_err(ThermalError::InvalidArgument)?;
        if params.is_empty() {
            debug!("Empty runtime config for control {} accepted", id);
        } else {
            debug!("Runtime config for control {} accepted (not applied)", id);
        }
        Ok(ConfigAck::Accepted)
    }

    pub fn aggregated_output(&self) -> f32 {
        self.controller.aggregated_output()
    }

    pub fn list_controls(&self) -> Vec<ControlSummary> {
        let mut controls: Vec<ControlSummary> = self
            .controller
            .loops()
            .into_iter()
            .map(|l| ControlSummary {
                id: l.id.0,
                name: l.name,
                enabled: l.enabled,
                closed_loop: true,
            })
            .collect();
        controls.extend(self.controller.passthrough().iter().map(|p| ControlSummary {
            id: p.id.0,
            name: p.name.clone(),
            enabled: true,
            closed_loop: false,
        }));
        controls
    }

    /// Dispatch a protocol request
    pub fn handle(&self, request: &Request) -> Response {
        if let Err(e) = request.validate() {
            return Response::error(ErrorKind::InvalidArgument, e);
        }

        let result = match request {
            Request::GetControlRuntimeInfo { id } => {
                self.get_runtime_info(LoopId(*id)).map(ResponseData::RuntimeInfo)
            }
            Request::SetControlRuntimeConfig { id, params } => self
                .set_runtime_config(LoopId(*id), params)
                .map(|ack| ResponseData::Ack { ack }),
            Request::GetFanCommand => Ok(ResponseData::FanCommand {
                duty: self.aggregated_output(),
            }),
            Request::ListControls => Ok(ResponseData::Controls {
                controls: self.list_controls(),
            }),
        };

        match result {
            Ok(data) => Response::Ok(data),
            Err(e) => {
                debug!("{} failed: {}", request.type_name(), e);
                Response::error(error_kind(&e), e.to_string())
            }
        }
    }
}

fn error_kind(err: &ThermalError) -> ErrorKind {
    match err {
        ThermalError::InvalidArgument(_) => ErrorKind::InvalidArgument,
        ThermalError::NotFound(_) => ErrorKind::NotFound,
        ThermalError::InputUnavailable { .. } => ErrorKind::InputUnavailable,
        _ => ErrorKind::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ThermalControlConfig, CONTROL_FAN, LOOP_HDD, LOOP_VR};
    use crate::sensors::{tray_sensor_table, MockSensorSource};
    use crate::settings::ThermalSettings;
    use smc_protocol::ControlMode;

    fn accessor() -> (Arc<ThermalController>, RuntimeInfoAccessor) {
        let controller = Arc::new(ThermalController::new(&ThermalSettings::default()).unwrap());
        let sensors: Arc<dyn SensorSource> = Arc::new(tray_sensor_table());
        (controller.clone(), RuntimeInfoAccessor::new(controller, sensors))
    }

    #[test]
    fn test_closed_loop_info() {
        let (controller, acc) = accessor();
        controller.install();

        let info = acc.get_runtime_info(LOOP_HDD).unwrap();
        assert_eq!(info.mode, ControlMode::Automatic);
        assert_eq!(info.setpoint, 48.0);
        assert_eq!(info.p_coeff, Some(-4.0));
        assert_eq!(info.i_coeff, Some(-0.01));
        assert_eq!(info.d_coeff, Some(0.0));
    }

    #[test]
    fn test_mode_follows_global_config() {
        let (controller, acc) = accessor();
        assert_eq!(acc.get_runtime_info(LOOP_VR).unwrap().mode, ControlMode::Manual);

        controller.install();
        assert_eq!(acc.get_runtime_info(LOOP_VR).unwrap().mode, ControlMode::Automatic);

        controller.set_control_config(ThermalControlConfig::Manual);
        assert_eq!(acc.get_runtime_info(LOOP_VR).unwrap().mode, ControlMode::Manual);
    }

    #[test]
    fn test_passthrough_reports_sensor_without_gains() {
        let (controller, acc) = accessor();
        controller.install();

        let info = acc.get_runtime_info(CONTROL_FAN).unwrap();
        assert_eq!(info.setpoint, 65.0);
        assert_eq!(info.mode, ControlMode::Automatic);
        assert!(!info.has_gains());
    }

    #[test]
    fn test_passthrough_sensor_failure() {
        let controller = Arc::new(ThermalController::new(&ThermalSettings::default()).unwrap());
        let mut sensors = MockSensorSource::new();
        sensors
            .expect_read()
            .returning(|id| Err(ThermalError::input_unavailable(id.name(), "offline")));
        let acc = RuntimeInfoAccessor::new(controller, Arc::new(sensors));

        assert!(matches!(
            acc.get_runtime_info(CONTROL_FAN),
            Err(ThermalError::InputUnavailable { .. })
        ));
    }

    #[test]
    fn test_read_into_requires_buffer() {
        let (_, acc) = accessor();
        assert!(matches!(
            acc.read_runtime_info_into(LOOP_VR, None),
            Err(ThermalError::InvalidArgument(_))
        ));

        let mut info = ControlRuntimeInfo::default();
        acc.read_runtime_info_into(LOOP_VR, Some(&mut info)).unwrap();
        assert_eq!(info.setpoint, 66.0);
    }

    #[test]
    fn test_set_runtime_config_is_noop() {
        let (controller, acc) = accessor();
        let before = acc.get_runtime_info(LOOP_VR).unwrap();
        let params = ControlConfigParams {
            setpoint: Some(80.0),
            p_coeff: Some(-1.0),
            ..Default::default()
        };

        assert_eq!(acc.set_runtime_config(LOOP_VR, &params).unwrap(), ConfigAck::Accepted);
        assert_eq!(acc.get_runtime_info(LOOP_VR).unwrap(), before);
        assert_eq!(controller.control_loop(LOOP_VR).unwrap().tuning.setpoint, 66.0);
    }

    #[test]
    fn test_set_runtime_config_errors() {
        let (_, acc) = accessor();
        assert!(matches!(
            acc.set_runtime_config(LoopId(42), &ControlConfigParams::default()),
            Err(ThermalError::NotFound(42))
        ));

        let bad = ControlConfigParams {
            setpoint: Some(f32::NAN),
            ..Default::default()
        };
        assert!(matches!(
            acc.set_runtime_config(LOOP_VR, &bad),
            Err(ThermalError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_handle_maps_errors() {
        let (_, acc) = accessor();
        match acc.handle(&Request::GetControlRuntimeInfo { id: 99 }) {
            Response::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
            other => panic!("unexpected response: {:?}", other),
        }

        let response = acc.handle(&Request::GetFanCommand);
        assert!(response.is_ok());
        assert_eq!(
            response,
            Response::Ok(ResponseData::FanCommand { duty: 60.0 })
        );
    }

    #[test]
    fn test_loop_mode_does_not_leak_under_automatic() {
        let mut settings = ThermalSettings::default();
        settings.loops[0].mode = ControlMode::Manual;
        let controller = Arc::new(ThermalController::new(&settings).unwrap());
        controller.install();
        let acc = RuntimeInfoAccessor::new(controller, Arc::new(tray_sensor_table()));

        assert_eq!(acc.get_runtime_info(LOOP_VR).unwrap().mode, ControlMode::Automatic);
    }

    #[test]
    fn test_list_controls() {
        let (_, acc) = accessor();
        let controls = acc.list_controls();
        assert_eq!(controls.len(), 3);
        assert!(controls[0].closed_loop);
        assert_eq!(controls[2].name, "Fan");
        assert!(!controls[2].closed_loop);
    }
}
