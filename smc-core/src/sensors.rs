//! Tray sensor table and collaborator seams
//!
//! The controller never talks to hardware directly. Process values come in
//! through [`SensorSource`] and the fan command goes out through
//! [`Actuator`]. [`SensorTable`] is the in-memory implementation of both:
//! a pass-through store of the latest readings with no acquisition or
//! calibration of its own.

use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::constants::fan;
use crate::data::{Clamp, SensorId, SensorUnit};
use smc_error::{Result, ThermalError};

/// Source of process values for the control loops
#[cfg_attr(test, mockall::automock)]
pub trait SensorSource: Send + Sync {
    /// Current reading of `sensor`; failure maps to `InputUnavailable`
    fn read(&self, sensor: SensorId) -> Result<f32>;
}

/// Sink for the arbitrated fan command
#[cfg_attr(test, mockall::automock)]
pub trait Actuator: Send + Sync {
    fn write(&self, sensor: SensorId, value: f32) -> Result<()>;
}

/// Static description of one registered sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSpec {
    pub id: SensorId,
    pub unit: SensorUnit,
    /// Accepted range for pass-through writes
    pub range: Clamp,
    /// Readings are produced by hardware and cannot be set externally
    pub write_protect: bool,
}

impl SensorSpec {
    pub fn new(id: SensorId, unit: SensorUnit, range: Clamp) -> Self {
        Self {
            id,
            unit,
            range,
            write_protect: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.write_protect = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }
}

#[derive(Debug, Clone)]
struct SensorEntry {
    spec: SensorSpec,
    reading: Option<f32>,
}

/// Registry of tray sensors and their latest readings
#[derive(Debug, Default)]
pub struct SensorTable {
    entries: RwLock<HashMap<SensorId, SensorEntry>>,
}

impl SensorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor, optionally with an initial reading
    pub fn register(&self, spec: SensorSpec, initial: Option<f32>) {
        debug!("Registering sensor {} ({:?})", spec.name(), spec.unit);
        self.entries.write().insert(
            spec.id,
            SensorEntry {
                spec,
                reading: initial,
            },
        );
    }

    pub fn spec(&self, sensor: SensorId) -> Option<SensorSpec> {
        self.entries.read().get(&sensor).map(|e| e.spec.clone())
    }

    pub fn is_registered(&self, sensor: SensorId) -> bool {
        self.entries.read().contains_key(&sensor)
    }

    /// Pass-through write of a new reading
    ///
    /// Rejected for write-protected sensors and for values outside the
    /// registered range.
    pub fn set_reading(&self, sensor: SensorId, value: f32) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&sensor)
            .ok_or_else(|| ThermalError::invalid_argument(format!("sensor {} is not registered", sensor)))?;

        if entry.spec.write_protect {
            return Err(ThermalError::invalid_argument(format!(
                "sensor {} is write protected",
                sensor
            )));
        }
        Self::store(entry, value)
    }

    /// Record a reading produced by hardware, ignoring write protection
    pub fn record(&self, sensor: SensorId, value: f32) -> Result<()> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(&sensor)
            .ok_or_else(|| ThermalError::invalid_argument(format!("sensor {} is not registered", sensor)))?;
        Self::store(entry, value)
    }

    /// Drop the current reading so reads fail until the next one arrives
    pub fn invalidate(&self, sensor: SensorId) {
        if let Some(entry) = self.entries.write().get_mut(&sensor) {
            entry.reading = None;
        }
    }

    fn store(entry: &mut SensorEntry, value: f32) -> Result<()> {
        if !value.is_finite() || !entry.spec.range.contains(value) {
            return Err(ThermalError::invalid_argument(format!(
                "{} out of range for sensor {} ({}..={})",
                value,
                entry.spec.name(),
                entry.spec.range.min,
                entry.spec.range.max
            )));
        }
        entry.reading = Some(value);
        Ok(())
    }
}

impl SensorSource for SensorTable {
    fn read(&self, sensor: SensorId) -> Result<f32> {
        let entries = self.entries.read();
        let entry = entries
            .get(&sensor)
            .ok_or_else(|| ThermalError::input_unavailable(sensor.name(), "not registered"))?;
        entry
            .reading
            .ok_or_else(|| ThermalError::input_unavailable(sensor.name(), "no reading"))
    }
}

impl Actuator for SensorTable {
    fn write(&self, sensor: SensorId, value: f32) -> Result<()> {
        trace!("ACTUATOR: {} <- {:.2}", sensor, value);
        self.record(sensor, value)
            .map_err(|e| ThermalError::actuator(sensor.name(), e.to_string()))
    }
}

/// Sensor table populated with the tray's sensors and their idle readings
pub fn tray_sensor_table() -> SensorTable {
    let table = SensorTable::new();
    let temp_range = Clamp::new(-40.0, 150.0);

    table.register(
        SensorSpec::new(SensorId::Voltage, SensorUnit::Volt, Clamp::new(0.0, 10.0)),
        None,
    );
    table.register(
        SensorSpec::new(SensorId::Current, SensorUnit::Amp, Clamp::new(0.0, 50.0)).read_only(),
        Some(2.55),
    );
    table.register(
        SensorSpec::new(SensorId::TrayTemp, SensorUnit::Celsius, temp_range).read_only(),
        Some(33.0),
    );
    table.register(
        SensorSpec::new(SensorId::Power, SensorUnit::Watt, Clamp::new(0.0, 2000.0)).read_only(),
        Some(250.0),
    );
    table.register(
        SensorSpec::new(SensorId::FanTach, SensorUnit::Rpm, Clamp::new(0.0, 20000.0)).read_only(),
        Some(8000.0),
    );
    table.register(
        SensorSpec::new(
            SensorId::FanDuty,
            SensorUnit::Percent,
            Clamp::new(fan::MIN_DUTY, fan::MAX_DUTY),
        ),
        Some(fan::DEFAULT_DUTY),
    );
    table.register(
        SensorSpec::new(SensorId::Hdd0Temp, SensorUnit::Celsius, temp_range).read_only(),
        Some(39.0),
    );
    table.register(
        SensorSpec::new(SensorId::Hdd1Temp, SensorUnit::Celsius, temp_range).read_only(),
        Some(40.0),
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tray_table_has_every_sensor() {
        let table = tray_sensor_table();
        for id in SensorId::ALL {
            assert!(table.is_registered(id), "{} missing", id);
        }
        assert_eq!(table.read(SensorId::TrayTemp).unwrap(), 33.0);
        assert_eq!(table.read(SensorId::FanDuty).unwrap(), fan::DEFAULT_DUTY);
    }

    #[test]
    fn test_tray_sensor_specs() {
        let table = tray_sensor_table();
        let duty = table.spec(SensorId::FanDuty).unwrap();
        assert_eq!(duty.unit, SensorUnit::Percent);
        assert!(!duty.write_protect);
        assert_eq!(duty.name(), "fan_duty");

        let temp = table.spec(SensorId::TrayTemp).unwrap();
        assert_eq!(temp.unit, SensorUnit::Celsius);
        assert!(temp.write_protect);
    }

    #[test]
    fn test_missing_reading_is_input_unavailable() {
        let table = tray_sensor_table();
        let err = table.read(SensorId::Voltage).unwrap_err();
        assert!(matches!(err, ThermalError::InputUnavailable { .. }));

        table.invalidate(SensorId::TrayTemp);
        assert!(table.read(SensorId::TrayTemp).is_err());
    }

    #[test]
    fn test_set_reading_respects_write_protect() {
        let table = tray_sensor_table();
        assert!(table.set_reading(SensorId::TrayTemp, 50.0).is_err());
        assert_eq!(table.read(SensorId::TrayTemp).unwrap(), 33.0);

        table.set_reading(SensorId::Voltage, 3.3).unwrap();
        assert_eq!(table.read(SensorId::Voltage).unwrap(), 3.3);
    }

    #[test]
    fn test_set_reading_rejects_out_of_range() {
        let table = tray_sensor_table();
        assert!(table.set_reading(SensorId::Voltage, 12.0).is_err());
        assert!(table.set_reading(SensorId::Voltage, f32::NAN).is_err());
    }

    #[test]
    fn test_record_bypasses_write_protect() {
        let table = tray_sensor_table();
        table.record(SensorId::Hdd0Temp, 45.0).unwrap();
        assert_eq!(table.read(SensorId::Hdd0Temp).unwrap(), 45.0);
    }

    #[test]
    fn test_actuator_write_updates_duty() {
        let table = tray_sensor_table();
        Actuator::write(&table, SensorId::FanDuty, 42.5).unwrap();
        assert_eq!(table.read(SensorId::FanDuty).unwrap(), 42.5);

        let err = Actuator::write(&table, SensorId::FanDuty, 150.0).unwrap_err();
        assert!(matches!(err, ThermalError::ActuatorWrite { .. }));
    }
}
