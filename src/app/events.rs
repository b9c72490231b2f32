//! Outbound application events.
//!
//! The [`GreenhouseService`](super::service::GreenhouseService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them.

use std::time::Duration;

use crate::config::ValveId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A scheduled or manual watering run started.
    WateringStarted { valve: ValveId, duration: Duration },

    /// The watering run finished and all valves are closed.
    WateringFinished { valve: ValveId },

    /// The watering run was cut short by a signal; valves are closed.
    WateringInterrupted { valve: ValveId },

    /// A sensor reading was appended to the log.
    ReadingLogged { temperature_c: f32, humidity_pct: f32 },

    /// The sensor could not be read; no record was written.
    ReadingDropped,

    /// A telemetry write failed but control carried on.
    StorageFailed { reason: String },

    /// The hourly cycle completed.
    CycleCompleted { hour: u32, watered: usize },
}
