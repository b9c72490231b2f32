//! Valve actuation state machine.
//!
//! ```text
//!            open_exclusive(id)            open_exclusive(other)
//!  AllClosed ──────────────────▶ Open(id) ─────────────────────▶ Open(other)
//!      ▲                            │
//!      └──── open_exclusive(0) ─────┘
//! ```
//!
//! Every transition drives all other configured lines off before the single
//! target line goes on, so at no instant is more than one valve energised.
//! Every transition is appended to the telemetry log as a ValveCommand,
//! including repeats: the log is an audit trail, not a diff.

use core::ops::{Deref, DerefMut};
use std::time::Duration;

use log::{debug, info, warn};

use super::ports::{ActuatorPort, Clock, DelayOutcome, DelayPort, RecordSink};
use crate::config::{ValveBank, ValveId};
use crate::error::{Error, Result};
use crate::telemetry::record::TelemetryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValveState {
    #[default]
    AllClosed,
    Open(ValveId),
}

impl ValveState {
    /// The open valve, if any.
    pub fn open_valve(self) -> Option<ValveId> {
        match self {
            Self::AllClosed => None,
            Self::Open(id) => Some(id),
        }
    }
}

pub struct ValveController<A> {
    actuators: A,
    valves: ValveBank,
    state: ValveState,
}

impl<A: ActuatorPort> ValveController<A> {
    pub fn new(actuators: A, valves: ValveBank) -> Self {
        Self {
            actuators,
            valves,
            state: ValveState::AllClosed,
        }
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn valves(&self) -> &ValveBank {
        &self.valves
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }

    /// Claim the actuator driver for the duration of the returned guard.
    ///
    /// Dropping the guard drives every valve off and releases the driver,
    /// whichever way the enclosing scope is left.
    pub fn session(&mut self) -> Result<ValveSession<'_, A>> {
        self.actuators.acquire().map_err(|source| Error::Actuator {
            valve: ValveId::ALL_CLOSED,
            source,
        })?;
        debug!("valve session opened");
        Ok(ValveSession { controller: self })
    }

    /// Open `id` and close every other valve; `0` closes all.
    ///
    /// The command record is written after the physical change.  If that
    /// write fails, the valves are already in their new state and the
    /// storage error is returned.
    pub fn open_exclusive(
        &mut self,
        id: ValveId,
        clock: &impl Clock,
        sink: &mut impl RecordSink,
    ) -> Result<()> {
        if !id.is_all_closed() && !self.valves.contains(id) {
            return Err(Error::UnknownValve(id));
        }

        for other in self.valves.ids().filter(|v| *v != id) {
            self.actuators
                .set_signal(other, false)
                .map_err(|source| Error::Actuator {
                    valve: other,
                    source,
                })?;
        }
        // Everything but the target is off now.
        self.state = ValveState::AllClosed;

        if !id.is_all_closed() {
            self.actuators
                .set_signal(id, true)
                .map_err(|source| Error::Actuator { valve: id, source })?;
            self.state = ValveState::Open(id);
        }
        info!("valve state -> {:?}", self.state);

        sink.append(&TelemetryRecord::valve_command(clock.now(), id))
    }

    /// Close every valve.
    pub fn close_all(&mut self, clock: &impl Clock, sink: &mut impl RecordSink) -> Result<()> {
        self.open_exclusive(ValveId::ALL_CLOSED, clock, sink)
    }

    /// Open `id`, hold it for `duration`, then close all.  Blocks.
    ///
    /// Storage failures do not shorten the hold or skip the close; the first
    /// one is returned once the valves are closed.  An interrupted hold
    /// closes all valves and returns [`Error::Interrupted`].
    pub fn open_timed(
        &mut self,
        id: ValveId,
        duration: Duration,
        clock: &impl Clock,
        delay: &mut impl DelayPort,
        sink: &mut impl RecordSink,
    ) -> Result<()> {
        let mut storage_error = None;
        let mut note = |result: Result<()>| -> Result<()> {
            match result {
                Err(e) if e.is_storage() => {
                    warn!("valve command not logged: {e}");
                    storage_error.get_or_insert(e);
                    Ok(())
                }
                other => other,
            }
        };

        note(self.open_exclusive(id, clock, sink))?;
        info!("holding valve {id} for {}s", duration.as_secs());

        let outcome = delay.delay(duration);
        note(self.close_all(clock, sink))?;

        if outcome == DelayOutcome::Interrupted {
            warn!("hold on valve {id} interrupted; all valves closed");
            return Err(Error::Interrupted(id));
        }
        storage_error.map_or(Ok(()), Err)
    }

    /// Best-effort all-off without logging, for teardown paths.
    fn force_all_off(&mut self) {
        for id in self.valves.ids() {
            if let Err(e) = self.actuators.set_signal(id, false) {
                warn!("could not drive valve {id} off: {e}");
            }
        }
        self.state = ValveState::AllClosed;
    }
}

/// Scoped access to an acquired [`ValveController`].
pub struct ValveSession<'a, A: ActuatorPort> {
    controller: &'a mut ValveController<A>,
}

impl<A: ActuatorPort> Deref for ValveSession<'_, A> {
    type Target = ValveController<A>;

    fn deref(&self) -> &Self::Target {
        self.controller
    }
}

impl<A: ActuatorPort> DerefMut for ValveSession<'_, A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.controller
    }
}

impl<A: ActuatorPort> Drop for ValveSession<'_, A> {
    fn drop(&mut self) {
        self.controller.force_all_off();
        self.controller.actuators.release();
        debug!("valve session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::{InstantDelay, ManualClock};
    use crate::config::ValveConfig;
    use crate::error::HardwareError;
    use crate::telemetry::record::RecordBody;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    /// Tracks line levels and fails on request.
    #[derive(Default)]
    struct Lines {
        levels: BTreeMap<u8, bool>,
        acquired: bool,
        released: usize,
        max_on: usize,
        fail_on: Option<u8>,
    }

    impl ActuatorPort for Lines {
        fn acquire(&mut self) -> core::result::Result<(), HardwareError> {
            self.acquired = true;
            Ok(())
        }

        fn set_signal(&mut self, id: ValveId, on: bool) -> core::result::Result<(), HardwareError> {
            if self.fail_on == Some(id.0) {
                return Err(HardwareError::UnknownActuator(id));
            }
            self.levels.insert(id.0, on);
            let count = self.levels.values().filter(|l| **l).count();
            self.max_on = self.max_on.max(count);
            Ok(())
        }

        fn release(&mut self) {
            self.acquired = false;
            self.released += 1;
        }
    }

    fn bank() -> ValveBank {
        ValveBank::new([22, 27, 17].map(|id| ValveConfig {
            id: ValveId(id),
            name: format!("v{id}"),
        }))
        .unwrap()
    }

    fn clock() -> ManualClock {
        ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(6, 0, 0)
                .unwrap(),
        )
    }

    fn commanded(log: &[TelemetryRecord]) -> Vec<u8> {
        log.iter()
            .filter_map(|r| match r.body {
                RecordBody::ValveCommand { valve } => Some(valve.0),
                RecordBody::SensorReading { .. } => None,
            })
            .collect()
    }

    #[test]
    fn open_exclusive_switches_and_logs_every_call() {
        let mut ctl = ValveController::new(Lines::default(), bank());
        let mut log: Vec<TelemetryRecord> = Vec::new();
        let clock = clock();

        ctl.open_exclusive(ValveId(22), &clock, &mut log).unwrap();
        ctl.open_exclusive(ValveId(22), &clock, &mut log).unwrap();
        ctl.open_exclusive(ValveId(27), &clock, &mut log).unwrap();

        assert_eq!(ctl.state(), ValveState::Open(ValveId(27)));
        assert_eq!(ctl.actuators().levels.get(&22), Some(&false));
        assert_eq!(ctl.actuators().levels.get(&27), Some(&true));
        assert_eq!(ctl.actuators().max_on, 1);
        assert_eq!(commanded(&log), vec![22, 22, 27]);
    }

    #[test]
    fn zero_closes_everything() {
        let mut ctl = ValveController::new(Lines::default(), bank());
        let mut log: Vec<TelemetryRecord> = Vec::new();
        ctl.open_exclusive(ValveId(17), &clock(), &mut log).unwrap();
        ctl.open_exclusive(ValveId::ALL_CLOSED, &clock(), &mut log).unwrap();
        assert_eq!(ctl.state(), ValveState::AllClosed);
        assert!(ctl.actuators().levels.values().all(|on| !on));
        assert_eq!(commanded(&log), vec![17, 0]);
    }

    #[test]
    fn unknown_valve_touches_nothing() {
        let mut ctl = ValveController::new(Lines::default(), bank());
        let mut log: Vec<TelemetryRecord> = Vec::new();
        let err = ctl.open_exclusive(ValveId(5), &clock(), &mut log).unwrap_err();
        assert!(matches!(err, Error::UnknownValve(ValveId(5))));
        assert!(ctl.actuators().levels.is_empty());
        assert!(log.is_empty());
    }

    #[test]
    fn actuator_failure_propagates_without_logging() {
        let lines = Lines {
            fail_on: Some(27),
            ..Lines::default()
        };
        let mut ctl = ValveController::new(lines, bank());
        let mut log: Vec<TelemetryRecord> = Vec::new();
        let err = ctl.open_exclusive(ValveId(27), &clock(), &mut log).unwrap_err();
        assert!(matches!(err, Error::Actuator { valve: ValveId(27), .. }));
        assert_eq!(ctl.state(), ValveState::AllClosed);
        assert!(log.is_empty());
    }

    #[test]
    fn open_timed_holds_then_closes() {
        let clock = clock();
        let mut delay = InstantDelay::with_clock(clock.clone());
        let mut ctl = ValveController::new(Lines::default(), bank());
        let mut log: Vec<TelemetryRecord> = Vec::new();

        ctl.open_timed(ValveId(22), Duration::from_secs(120), &clock, &mut delay, &mut log)
            .unwrap();

        assert_eq!(delay.requested(), vec![Duration::from_secs(120)]);
        assert_eq!(ctl.state(), ValveState::AllClosed);
        assert_eq!(commanded(&log), vec![22, 0]);
        assert_eq!(log[1].timestamp.minute, 2);
    }

    #[test]
    fn interrupted_hold_closes_and_reports() {
        let clock = clock();
        let mut delay = InstantDelay::new().interrupt_on_call(1);
        let mut ctl = ValveController::new(Lines::default(), bank());
        let mut log: Vec<TelemetryRecord> = Vec::new();

        let err = ctl
            .open_timed(ValveId(27), Duration::from_secs(60), &clock, &mut delay, &mut log)
            .unwrap_err();

        assert!(matches!(err, Error::Interrupted(ValveId(27))));
        assert_eq!(ctl.state(), ValveState::AllClosed);
        assert_eq!(commanded(&log), vec![27, 0]);
    }

    struct BrokenStore;

    impl RecordSink for BrokenStore {
        fn append(&mut self, _: &TelemetryRecord) -> Result<()> {
            Err(Error::storage(
                "/nowhere",
                std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            ))
        }
    }

    #[test]
    fn storage_failure_does_not_block_the_hold() {
        let clock = clock();
        let mut delay = InstantDelay::new();
        let mut ctl = ValveController::new(Lines::default(), bank());

        let err = ctl
            .open_timed(ValveId(22), Duration::from_secs(30), &clock, &mut delay, &mut BrokenStore)
            .unwrap_err();

        assert!(err.is_storage());
        assert_eq!(delay.requested(), vec![Duration::from_secs(30)]);
        assert_eq!(ctl.state(), ValveState::AllClosed);
        assert_eq!(ctl.actuators().levels.get(&22), Some(&false));
    }

    #[test]
    fn session_drop_forces_all_off_and_releases() {
        let mut ctl = ValveController::new(Lines::default(), bank());
        {
            let mut session = ctl.session().unwrap();
            assert!(session.actuators().acquired);
            session.open_exclusive(ValveId(17), &clock(), &mut Vec::<TelemetryRecord>::new()).unwrap();
        }
        assert_eq!(ctl.state(), ValveState::AllClosed);
        assert!(!ctl.actuators().acquired);
        assert_eq!(ctl.actuators().released, 1);
        assert!(ctl.actuators().levels.values().all(|on| !on));
    }
}
