//! Unified error types for the greenhouse controller.
//!
//! A single [`Error`] enum that every subsystem converts into, so the
//! periodic job and the CLI handle failures uniformly.  Hardware and sensor
//! driver failures keep their own types because they follow different
//! policies: actuator errors always propagate, sensor errors are retried and
//! then degraded to a skipped reading.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ValveId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible core operation funnels into this type.
#[derive(Debug, Error)]
pub enum Error {
    /// The log directory or one of its files could not be read or written.
    #[error("storage unavailable at {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The physical actuation of a valve failed.  Never retried.
    #[error("actuator for valve {valve} failed: {source}")]
    Actuator {
        valve: ValveId,
        #[source]
        source: HardwareError,
    },

    /// A valve id outside the configured bank was requested.
    #[error("valve {0} is not configured")]
    UnknownValve(ValveId),

    /// A timed hold was cut short by SIGINT/SIGTERM.  All valves were
    /// driven off before this error was returned.
    #[error("interrupted while valve {0} was held open; all valves closed")]
    Interrupted(ValveId),

    /// Configuration is invalid or could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            source,
        }
    }

    /// True for failures of the telemetry log rather than of the hardware.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }
}

// ---------------------------------------------------------------------------
// Actuator driver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HardwareError {
    /// The driver has no line for this actuator.
    #[error("no GPIO line for actuator {0}")]
    UnknownActuator(ValveId),
    /// `set_signal` was called outside an acquired session.
    #[error("actuator driver not acquired")]
    NotAcquired,
    /// Exporting, configuring or writing a GPIO line failed.
    #[error("GPIO {pin}: {source}")]
    Gpio {
        pin: u8,
        #[source]
        source: io::Error,
    },
}

// ---------------------------------------------------------------------------
// Sensor driver errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DriverError {
    /// The I2C transfer itself failed.
    #[error("I2C bus error: {0}")]
    Bus(String),
    /// The measurement checksum did not match.
    #[error("measurement CRC mismatch (got {got:#04x}, expected {expected:#04x})")]
    Crc { got: u8, expected: u8 },
}

// ---------------------------------------------------------------------------
// Record errors
// ---------------------------------------------------------------------------

/// A decoded record whose type tag is outside the recognised set.
///
/// Never raised while scanning: corrupt records are skipped and counted.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("corrupt record: unknown kind tag {tag}")]
pub struct CorruptRecord {
    pub tag: f32,
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
