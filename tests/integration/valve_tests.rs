//! Valve controller behaviour against the recording mock.

use std::time::Duration;

use greenhouse::Error;
use greenhouse::adapters::clock::{InstantDelay, ManualClock};
use greenhouse::app::valves::{ValveController, ValveState};
use greenhouse::config::{SystemConfig, ValveId};
use greenhouse::telemetry::{RecordBody, TelemetryRecord};

use crate::mock_hw::{ActuatorCall, BrokenStore, MockActuators, at};

fn controller(actuators: MockActuators) -> ValveController<MockActuators> {
    ValveController::new(actuators, SystemConfig::default().valves)
}

#[test]
fn offs_are_issued_before_the_single_on() {
    let mut ctl = controller(MockActuators::new());
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let mut log: Vec<TelemetryRecord> = Vec::new();

    ctl.open_exclusive(ValveId(27), &clock, &mut log).unwrap();

    let calls = &ctl.actuators().calls;
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], ActuatorCall::Set { valve: 27, on: true });
    assert!(calls[..2].iter().all(|c| matches!(c, ActuatorCall::Set { on: false, .. })));
}

#[test]
fn exclusivity_holds_across_a_sequence() {
    let mut ctl = controller(MockActuators::new());
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let mut log: Vec<TelemetryRecord> = Vec::new();

    for id in [22, 27, 27, 0, 17, 22, 0] {
        ctl.open_exclusive(ValveId(id), &clock, &mut log).unwrap();
        let expected = if id == 0 {
            ValveState::AllClosed
        } else {
            ValveState::Open(ValveId(id))
        };
        assert_eq!(ctl.state(), expected);
    }

    assert_eq!(ctl.actuators().max_simultaneously_on(), 1);
    assert_eq!(log.len(), 7);
}

#[test]
fn failing_actuator_is_not_retried() {
    let mut ctl = controller(MockActuators::broken(17));
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let mut delay = InstantDelay::new();
    let mut log: Vec<TelemetryRecord> = Vec::new();

    let err = ctl
        .open_timed(ValveId(17), Duration::from_secs(60), &clock, &mut delay, &mut log)
        .unwrap_err();

    assert!(matches!(err, Error::Actuator { valve: ValveId(17), .. }));
    assert_eq!(ctl.actuators().attempts_on(17), 1);
    assert!(delay.requested().is_empty(), "no hold after a failed open");
    assert!(log.is_empty());
}

#[test]
fn session_closes_valves_after_an_actuator_error() {
    let mut ctl = controller(MockActuators::broken(17));
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let mut log: Vec<TelemetryRecord> = Vec::new();

    let result = (|| -> greenhouse::Result<()> {
        let mut session = ctl.session()?;
        session.open_exclusive(ValveId(22), &clock, &mut log)?;
        session.open_exclusive(ValveId(17), &clock, &mut log)?;
        Ok(())
    })();

    assert!(result.is_err());
    let calls = &ctl.actuators().calls;
    assert_eq!(calls.first(), Some(&ActuatorCall::Acquire));
    assert_eq!(calls.last(), Some(&ActuatorCall::Release));
    assert_eq!(ctl.actuators().levels().get(&22), Some(&false));
    assert_eq!(ctl.state(), ValveState::AllClosed);
}

#[test]
fn storage_outage_still_waters_for_full_duration() {
    let mut ctl = controller(MockActuators::new());
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let mut delay = InstantDelay::with_clock(clock.clone());

    let err = ctl
        .open_timed(ValveId(22), Duration::from_secs(120), &clock, &mut delay, &mut BrokenStore)
        .unwrap_err();

    assert!(err.is_storage());
    assert_eq!(delay.requested(), vec![Duration::from_secs(120)]);
    assert_eq!(ctl.actuators().attempts_on(22), 1);
    assert!(ctl.actuators().all_off());
}

#[test]
fn repeated_open_logs_each_command() {
    let mut ctl = controller(MockActuators::new());
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let mut log: Vec<TelemetryRecord> = Vec::new();

    ctl.open_exclusive(ValveId(22), &clock, &mut log).unwrap();
    let levels_once = ctl.actuators().levels();
    ctl.open_exclusive(ValveId(22), &clock, &mut log).unwrap();

    assert_eq!(ctl.actuators().levels(), levels_once);
    assert_eq!(log.len(), 2);
    assert!(
        log.iter()
            .all(|r| r.body == RecordBody::ValveCommand { valve: ValveId(22) })
    );
}
