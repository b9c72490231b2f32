//! HTU21D(F) temperature / relative humidity sensor (I2C).
//!
//! Hold-master measurements: the sensor stretches the clock until the
//! conversion is done, so a measurement is one command write followed by a
//! 3-byte read (MSB, LSB, CRC).  The two low bits of the LSB are status
//! bits and are masked off before conversion.
//!
//! | Quantity | Command | Conversion                       |
//! |----------|---------|----------------------------------|
//! | T (C)    | `0xE3`  | `-46.85 + 175.72 * raw / 65536`  |
//! | RH (%)   | `0xE5`  | `-6 + 125 * raw / 65536`         |

use embedded_hal::i2c::I2c;
use log::trace;

use crate::app::ports::SensorPort;
use crate::error::DriverError;

pub const DEFAULT_ADDRESS: u8 = 0x40;

const TRIGGER_TEMPERATURE_HOLD: u8 = 0xE3;
const TRIGGER_HUMIDITY_HOLD: u8 = 0xE5;
const SOFT_RESET: u8 = 0xFE;

const STATUS_MASK: u16 = 0xFFFC;
const CRC_POLYNOMIAL: u8 = 0x31;

/// CRC-8, polynomial x^8 + x^5 + x^4 + 1, initial value 0.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC_POLYNOMIAL
            } else {
                crc << 1
            };
        }
        crc
    })
}

pub fn temperature_from_raw(raw: u16) -> f32 {
    -46.85 + 175.72 * f32::from(raw & STATUS_MASK) / 65536.0
}

pub fn humidity_from_raw(raw: u16) -> f32 {
    -6.0 + 125.0 * f32::from(raw & STATUS_MASK) / 65536.0
}

pub struct Htu21d<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Htu21d<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub fn release(self) -> I {
        self.i2c
    }

    pub fn soft_reset(&mut self) -> Result<(), DriverError> {
        self.i2c
            .write(self.address, &[SOFT_RESET])
            .map_err(|e| DriverError::Bus(format!("{e:?}")))
    }

    /// Issue `command` and return the checked raw reading.
    fn measure(&mut self, command: u8) -> Result<u16, DriverError> {
        let mut frame = [0u8; 3];
        self.i2c
            .write_read(self.address, &[command], &mut frame)
            .map_err(|e| DriverError::Bus(format!("{e:?}")))?;
        let expected = crc8(&frame[..2]);
        if frame[2] != expected {
            return Err(DriverError::Crc {
                got: frame[2],
                expected,
            });
        }
        let raw = u16::from_be_bytes([frame[0], frame[1]]);
        trace!("htu21d cmd {command:#04x} -> {raw:#06x}");
        Ok(raw)
    }
}

impl<I: I2c> SensorPort for Htu21d<I> {
    fn read_temperature(&mut self) -> Result<f32, DriverError> {
        self.measure(TRIGGER_TEMPERATURE_HOLD).map(temperature_from_raw)
    }

    fn read_humidity(&mut self) -> Result<f32, DriverError> {
        self.measure(TRIGGER_HUMIDITY_HOLD).map(humidity_from_raw)
    }
}
