//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ValveController / SensorSampler / GreenhouseService
//! ```
//!
//! Driven adapters (GPIO relays, the I2C sensor, the wall clock, the log
//! store) implement these traits.  The domain consumes them via generics,
//! so the core never touches hardware or the filesystem directly and every
//! path is testable with mocks.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::config::ValveId;
use crate::error::{DriverError, HardwareError, Result};
use crate::telemetry::record::TelemetryRecord;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → relays)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to drive valve relays.
///
/// Usage is bracketed: [`acquire`](Self::acquire) before the first signal,
/// [`release`](Self::release) on every exit path.  The valve session guard
/// does the bracketing; callers never pair these by hand.
pub trait ActuatorPort {
    /// Claim the driver handle with every line driven off.
    fn acquire(&mut self) -> core::result::Result<(), HardwareError>;

    /// Drive one actuator's line.  `on == true` energises the relay.
    fn set_signal(&mut self, actuator: ValveId, on: bool) -> core::result::Result<(), HardwareError>;

    /// Drive every line off and close the driver handle.  Best effort:
    /// called from drop paths, so it cannot fail.
    fn release(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the temperature/humidity sensor.
pub trait SensorPort {
    fn read_temperature(&mut self) -> core::result::Result<f32, DriverError>;

    fn read_humidity(&mut self) -> core::result::Result<f32, DriverError>;
}

// ───────────────────────────────────────────────────────────────
// Time ports
// ───────────────────────────────────────────────────────────────

/// Local wall-clock time, used for record stamps, rotation and the
/// watering schedule.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// How a [`DelayPort::delay`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayOutcome {
    /// The full duration passed.
    Elapsed,
    /// An external interrupt (SIGINT/SIGTERM) cut the wait short.
    Interrupted,
}

/// Blocking wait.  Valve holds and sensor retries go through this so tests
/// can run them instantly and observe the requested durations.
pub trait DelayPort {
    fn delay(&mut self, duration: Duration) -> DelayOutcome;
}

// ───────────────────────────────────────────────────────────────
// Record sink (driven adapter: domain → telemetry log)
// ───────────────────────────────────────────────────────────────

/// Destination for telemetry records.  The log store is the production
/// implementation; a `Vec` collects records in tests.
pub trait RecordSink {
    fn append(&mut self, record: &TelemetryRecord) -> Result<()>;
}

impl RecordSink for Vec<TelemetryRecord> {
    fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        self.push(*record);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Collects events; used by tests and the simulated backend.
impl EventSink for Vec<super::events::AppEvent> {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.push(event.clone());
    }
}
