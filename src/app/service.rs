//! Application service: the hexagonal core.
//!
//! [`GreenhouseService`] owns the valve controller, the sensor sampler and
//! the watering schedule.  The record sink and event sink are injected at
//! call sites, so the whole cycle runs against mocks in tests.
//!
//! ```text
//!  SensorPort ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                 │   GreenhouseService      │
//! ActuatorPort ◀──│  schedule · valves · RH  │ ──▶ RecordSink (LogStore)
//!                 └─────────────────────────┘
//! ```

use std::time::Duration;

use chrono::Timelike;
use log::{info, warn};

use super::events::AppEvent;
use super::ports::{ActuatorPort, Clock, DelayPort, EventSink, RecordSink, SensorPort};
use super::sampler::SensorSampler;
use super::valves::{ValveController, ValveState};
use crate::config::{SystemConfig, ValveId, WateringSlot};
use crate::error::{Error, Result};
use crate::telemetry::record::{RecordBody, TelemetryRecord};

/// What one periodic cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub hour: u32,
    pub watered: usize,
    pub reading: Option<TelemetryRecord>,
}

pub struct GreenhouseService<A, S, C, D> {
    valves: ValveController<A>,
    sampler: SensorSampler<S>,
    schedule: Vec<WateringSlot>,
    clock: C,
    delay: D,
}

impl<A, S, C, D> GreenhouseService<A, S, C, D>
where
    A: ActuatorPort,
    S: SensorPort,
    C: Clock,
    D: DelayPort,
{
    pub fn new(config: &SystemConfig, actuators: A, sensor: S, clock: C, delay: D) -> Self {
        Self {
            valves: ValveController::new(actuators, config.valves.clone()),
            sampler: SensorSampler::new(sensor, &config.sampler),
            schedule: config.schedule.clone(),
            clock,
            delay,
        }
    }

    // ── Upward operations ─────────────────────────────────────

    /// The hourly job: run any watering due this hour, then log a reading.
    ///
    /// Watering comes first so a sensor failure can never prevent it.
    /// Storage failures are remembered and the cycle carries on; the first
    /// one is returned at the end.  Actuator failures and interrupts end
    /// the cycle at once, with every valve off.
    pub fn run_periodic_cycle(
        &mut self,
        sink: &mut impl RecordSink,
        events: &mut impl EventSink,
    ) -> Result<CycleReport> {
        let hour = self.clock.now().hour();
        let due: Vec<WateringSlot> = self
            .schedule
            .iter()
            .filter(|slot| u32::from(slot.hour) == hour)
            .cloned()
            .collect();

        let mut storage_error = None;
        let mut watered = 0;
        if !due.is_empty() {
            let mut session = self.valves.session()?;
            for slot in &due {
                events.emit(&AppEvent::WateringStarted {
                    valve: slot.valve,
                    duration: slot.duration(),
                });
                let result = session.open_timed(
                    slot.valve,
                    slot.duration(),
                    &self.clock,
                    &mut self.delay,
                    sink,
                );
                match settle(slot.valve, result, events) {
                    Ok(()) => {}
                    Err(e) if e.is_storage() => {
                        storage_error.get_or_insert(e);
                    }
                    Err(e) => return Err(e),
                }
                watered += 1;
            }
        }

        let reading = match self.sampler.sample_and_log(&self.clock, &mut self.delay, sink) {
            Ok(Some(record)) => {
                if let RecordBody::SensorReading {
                    temperature_c,
                    humidity_pct,
                } = record.body
                {
                    events.emit(&AppEvent::ReadingLogged {
                        temperature_c,
                        humidity_pct,
                    });
                }
                Some(record)
            }
            Ok(None) => {
                events.emit(&AppEvent::ReadingDropped);
                None
            }
            Err(e) => {
                events.emit(&AppEvent::StorageFailed {
                    reason: e.to_string(),
                });
                storage_error.get_or_insert(e);
                None
            }
        };

        events.emit(&AppEvent::CycleCompleted { hour, watered });
        match storage_error {
            Some(e) => Err(e),
            None => Ok(CycleReport {
                hour,
                watered,
                reading,
            }),
        }
    }

    /// Water one valve for `seconds`, outside the schedule.
    pub fn open_valve_for(
        &mut self,
        id: ValveId,
        seconds: u64,
        sink: &mut impl RecordSink,
        events: &mut impl EventSink,
    ) -> Result<()> {
        if id.is_all_closed() || !self.valves.valves().contains(id) {
            return Err(Error::UnknownValve(id));
        }
        let duration = Duration::from_secs(seconds);
        let mut session = self.valves.session()?;
        events.emit(&AppEvent::WateringStarted {
            valve: id,
            duration,
        });
        let result = session.open_timed(id, duration, &self.clock, &mut self.delay, sink);
        settle(id, result, events)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn valve_state(&self) -> ValveState {
        self.valves.state()
    }

    pub fn valves(&self) -> &ValveController<A> {
        &self.valves
    }

    pub fn sampler(&self) -> &SensorSampler<S> {
        &self.sampler
    }

    pub fn schedule(&self) -> &[WateringSlot] {
        &self.schedule
    }
}

/// Report how a timed hold ended and pass the result on.
fn settle(valve: ValveId, result: Result<()>, events: &mut impl EventSink) -> Result<()> {
    match &result {
        Ok(()) => {
            info!("watering on valve {valve} finished");
            events.emit(&AppEvent::WateringFinished { valve });
        }
        Err(Error::Interrupted(_)) => {
            events.emit(&AppEvent::WateringInterrupted { valve });
        }
        Err(e) if e.is_storage() => {
            events.emit(&AppEvent::StorageFailed {
                reason: e.to_string(),
            });
            events.emit(&AppEvent::WateringFinished { valve });
        }
        Err(e) => warn!("watering on valve {valve} failed: {e}"),
    }
    result
}
