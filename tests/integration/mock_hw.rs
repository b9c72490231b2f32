//! Mock hardware adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO lines.

use std::collections::{BTreeMap, VecDeque};

use chrono::{NaiveDate, NaiveDateTime};
use greenhouse::Error;
use greenhouse::app::ports::{ActuatorPort, RecordSink, SensorPort};
use greenhouse::config::ValveId;
use greenhouse::error::{DriverError, HardwareError};
use greenhouse::telemetry::TelemetryRecord;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Acquire,
    Set { valve: u8, on: bool },
    Release,
}

// ── MockActuators ─────────────────────────────────────────────

#[derive(Default)]
pub struct MockActuators {
    pub calls: Vec<ActuatorCall>,
    /// Valves whose `set_signal` always fails.
    pub broken: Vec<u8>,
}

#[allow(dead_code)]
impl MockActuators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn broken(valve: u8) -> Self {
        Self {
            broken: vec![valve],
            ..Self::default()
        }
    }

    /// Line levels after replaying every recorded call.
    pub fn levels(&self) -> BTreeMap<u8, bool> {
        let mut levels = BTreeMap::new();
        for call in &self.calls {
            if let ActuatorCall::Set { valve, on } = call {
                levels.insert(*valve, *on);
            }
        }
        levels
    }

    /// Replay the history and return the most lines ever on together.
    pub fn max_simultaneously_on(&self) -> usize {
        let mut levels = BTreeMap::new();
        let mut max = 0;
        for call in &self.calls {
            if let ActuatorCall::Set { valve, on } = call {
                levels.insert(*valve, *on);
                max = max.max(levels.values().filter(|on| **on).count());
            }
        }
        max
    }

    pub fn all_off(&self) -> bool {
        self.levels().values().all(|on| !on)
    }

    pub fn attempts_on(&self, valve: u8) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == ActuatorCall::Set { valve, on: true })
            .count()
    }
}

impl ActuatorPort for MockActuators {
    fn acquire(&mut self) -> Result<(), HardwareError> {
        self.calls.push(ActuatorCall::Acquire);
        Ok(())
    }

    fn set_signal(&mut self, actuator: ValveId, on: bool) -> Result<(), HardwareError> {
        self.calls.push(ActuatorCall::Set {
            valve: actuator.0,
            on,
        });
        if self.broken.contains(&actuator.0) {
            return Err(HardwareError::UnknownActuator(actuator));
        }
        Ok(())
    }

    fn release(&mut self) {
        self.calls.push(ActuatorCall::Release);
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Plays back a script of readings; an exhausted script fails.
#[derive(Default)]
pub struct ScriptedSensor {
    pub temperatures: VecDeque<Result<f32, ()>>,
    pub humidities: VecDeque<Result<f32, ()>>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn steady(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperatures: VecDeque::from(vec![Ok(temperature_c); 16]),
            humidities: VecDeque::from(vec![Ok(humidity_pct); 16]),
        }
    }

    pub fn dead() -> Self {
        Self::default()
    }
}

impl SensorPort for ScriptedSensor {
    fn read_temperature(&mut self) -> Result<f32, DriverError> {
        match self.temperatures.pop_front() {
            Some(Ok(t)) => Ok(t),
            _ => Err(DriverError::Bus("no device".into())),
        }
    }

    fn read_humidity(&mut self) -> Result<f32, DriverError> {
        match self.humidities.pop_front() {
            Some(Ok(h)) => Ok(h),
            _ => Err(DriverError::Bus("no device".into())),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

/// A record sink whose disk is gone.
pub struct BrokenStore;

impl RecordSink for BrokenStore {
    fn append(&mut self, _record: &TelemetryRecord) -> greenhouse::Result<()> {
        Err(Error::StorageUnavailable {
            path: "/mnt/gone".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
    }
}

// ── Time ──────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}
