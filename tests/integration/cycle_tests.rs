//! The hourly cycle end to end: service → simulated GPIO → log directory.

use std::time::Duration;

use greenhouse::Error;
use greenhouse::adapters::clock::{InstantDelay, ManualClock};
use greenhouse::adapters::hardware::GpioActuators;
use greenhouse::app::events::AppEvent;
use greenhouse::app::service::GreenhouseService;
use greenhouse::config::{LogConfig, SystemConfig, ValveId, WateringSlot};
use greenhouse::drivers::gpio::SimBackend;
use greenhouse::sensors::SimulatedSensor;
use greenhouse::telemetry::{self, LogStore, RecordBody, TelemetryRecord};

use crate::mock_hw::{BrokenStore, MockActuators, ScriptedSensor, at};

fn log_config(dir: &std::path::Path) -> LogConfig {
    LogConfig {
        dir: dir.to_path_buf(),
        owner: None,
        ..LogConfig::default()
    }
}

fn read_active(store: &LogStore<ManualClock>) -> Vec<TelemetryRecord> {
    let path = store.current_log_file().unwrap().unwrap();
    telemetry::read_log(&path).unwrap().records().collect()
}

#[test]
fn morning_cycle_writes_commands_then_reading() {
    let dir = tempfile::tempdir().unwrap();
    let config = SystemConfig::default();
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let gpio = SimBackend::new();
    let mut store = LogStore::new(&log_config(dir.path()), clock.clone());
    let mut events: Vec<AppEvent> = Vec::new();
    let mut app = GreenhouseService::new(
        &config,
        GpioActuators::new(gpio.clone(), &config.valves),
        SimulatedSensor::new(22.0, 51.0),
        clock.clone(),
        InstantDelay::with_clock(clock.clone()),
    );

    let report = app.run_periodic_cycle(&mut store, &mut events).unwrap();
    assert_eq!(report.watered, 1);

    let records = read_active(&store);
    let bodies: Vec<RecordBody> = records.iter().map(|r| r.body).collect();
    assert_eq!(
        bodies,
        vec![
            RecordBody::ValveCommand { valve: ValveId(22) },
            RecordBody::ValveCommand { valve: ValveId::ALL_CLOSED },
            RecordBody::SensorReading {
                temperature_c: 22.0,
                humidity_pct: 51.0
            },
        ]
    );
    assert_eq!(gpio.max_simultaneous_high(), 1);
    assert!(gpio.high_lines().is_empty());
    assert!(!gpio.is_claimed(22), "lines are released after the cycle");
}

#[test]
fn dead_sensor_does_not_prevent_watering() {
    let config = SystemConfig::default();
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let delay = InstantDelay::with_clock(clock.clone());
    let mut app = GreenhouseService::new(
        &config,
        MockActuators::new(),
        ScriptedSensor::dead(),
        clock,
        delay.clone(),
    );
    let mut log: Vec<TelemetryRecord> = Vec::new();
    let mut events: Vec<AppEvent> = Vec::new();

    let report = app.run_periodic_cycle(&mut log, &mut events).unwrap();

    assert_eq!(report.watered, 1);
    assert!(report.reading.is_none());
    assert_eq!(log.len(), 2, "two valve commands, no reading");
    assert!(events.contains(&AppEvent::ReadingDropped));
    // One 120 s hold plus two retry waits.
    assert_eq!(
        delay.requested(),
        vec![
            Duration::from_secs(120),
            Duration::from_secs(1),
            Duration::from_secs(1)
        ]
    );
}

#[test]
fn storage_outage_still_waters_and_reports() {
    let config = SystemConfig::default();
    let clock = ManualClock::new(at(2024, 6, 1, 6));
    let mut app = GreenhouseService::new(
        &config,
        MockActuators::new(),
        ScriptedSensor::steady(20.0, 60.0),
        clock.clone(),
        InstantDelay::with_clock(clock),
    );
    let mut events: Vec<AppEvent> = Vec::new();

    let err = app.run_periodic_cycle(&mut BrokenStore, &mut events).unwrap_err();

    assert!(err.is_storage());
    assert_eq!(app.valves().actuators().attempts_on(22), 1);
    assert!(app.valves().actuators().all_off());
    assert!(events.contains(&AppEvent::WateringFinished { valve: ValveId(22) }));
    assert!(matches!(events.last(), Some(AppEvent::CycleCompleted { watered: 1, .. })));
}

#[test]
fn missing_log_directory_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = SystemConfig::default();
    let clock = ManualClock::new(at(2024, 6, 1, 13));
    let mut store = LogStore::new(&log_config(&dir.path().join("absent")), clock.clone());
    let mut app = GreenhouseService::new(
        &config,
        MockActuators::new(),
        ScriptedSensor::steady(20.0, 60.0),
        clock,
        InstantDelay::new(),
    );

    let err = app
        .run_periodic_cycle(&mut store, &mut Vec::<AppEvent>::new())
        .unwrap_err();
    assert!(matches!(err, Error::StorageUnavailable { .. }));
}

#[test]
fn every_matching_slot_runs_in_order() {
    let mut config = SystemConfig::default();
    config.schedule = vec![
        WateringSlot {
            hour: 18,
            valve: ValveId(27),
            seconds: 60,
        },
        WateringSlot {
            hour: 18,
            valve: ValveId(17),
            seconds: 30,
        },
        WateringSlot {
            hour: 6,
            valve: ValveId(22),
            seconds: 120,
        },
    ];
    let clock = ManualClock::new(at(2024, 6, 1, 18));
    let delay = InstantDelay::new();
    let mut app = GreenhouseService::new(
        &config,
        MockActuators::new(),
        ScriptedSensor::steady(20.0, 60.0),
        clock,
        delay.clone(),
    );
    let mut log: Vec<TelemetryRecord> = Vec::new();

    let report = app
        .run_periodic_cycle(&mut log, &mut Vec::<AppEvent>::new())
        .unwrap();

    assert_eq!(report.watered, 2);
    assert_eq!(
        delay.requested(),
        vec![Duration::from_secs(60), Duration::from_secs(30)]
    );
    assert_eq!(app.valves().actuators().attempts_on(22), 0);
    assert_eq!(app.valves().actuators().max_simultaneously_on(), 1);
}
