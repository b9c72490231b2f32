//! Sensor drivers behind [`SensorPort`].
//!
//! - [`htu21d::Htu21d`]: the greenhouse temperature/humidity sensor on I2C.
//! - [`SimulatedSensor`]: fixed values for running without hardware.

pub mod htu21d;

use crate::app::ports::SensorPort;
use crate::error::DriverError;

/// Reports the same reading every time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedSensor {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

impl SimulatedSensor {
    pub fn new(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_c,
            humidity_pct,
        }
    }
}

impl SensorPort for SimulatedSensor {
    fn read_temperature(&mut self) -> Result<f32, DriverError> {
        Ok(self.temperature_c)
    }

    fn read_humidity(&mut self) -> Result<f32, DriverError> {
        Ok(self.humidity_pct)
    }
}
