//! Bounded-retry sensor sampling.
//!
//! Each quantity gets a fixed number of attempts with a fixed wait between
//! them.  Exhaustion is an ordinary `None`, never an error: the periodic job
//! must not fail because the sensor is flaky.

use core::fmt;
use std::time::Duration;

use log::{debug, warn};

use super::ports::{Clock, DelayOutcome, DelayPort, RecordSink, SensorPort};
use crate::config::SamplerConfig;
use crate::error::{DriverError, Result};
use crate::telemetry::record::TelemetryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quantity {
    Temperature,
    Humidity,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        })
    }
}

pub struct SensorSampler<S> {
    sensor: S,
    attempts: u32,
    retry_delay: Duration,
}

impl<S: SensorPort> SensorSampler<S> {
    pub fn new(sensor: S, config: &SamplerConfig) -> Self {
        Self {
            sensor,
            attempts: config.attempts.max(1),
            retry_delay: config.retry_delay(),
        }
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn sample_temperature(&mut self, delay: &mut impl DelayPort) -> Option<f32> {
        self.sample(Quantity::Temperature, delay)
    }

    pub fn sample_humidity(&mut self, delay: &mut impl DelayPort) -> Option<f32> {
        self.sample(Quantity::Humidity, delay)
    }

    /// Read both quantities and append a reading.  If either is
    /// unavailable nothing is written and `Ok(None)` is returned.
    pub fn sample_and_log(
        &mut self,
        clock: &impl Clock,
        delay: &mut impl DelayPort,
        sink: &mut impl RecordSink,
    ) -> Result<Option<TelemetryRecord>> {
        let Some(temperature_c) = self.sample_temperature(delay) else {
            return Ok(None);
        };
        let Some(humidity_pct) = self.sample_humidity(delay) else {
            return Ok(None);
        };
        let record = TelemetryRecord::sensor_reading(clock.now(), temperature_c, humidity_pct);
        sink.append(&record)?;
        debug!("logged {record}");
        Ok(Some(record))
    }

    fn read(&mut self, quantity: Quantity) -> core::result::Result<f32, DriverError> {
        match quantity {
            Quantity::Temperature => self.sensor.read_temperature(),
            Quantity::Humidity => self.sensor.read_humidity(),
        }
    }

    fn sample(&mut self, quantity: Quantity, delay: &mut impl DelayPort) -> Option<f32> {
        for attempt in 1..=self.attempts {
            match self.read(quantity) {
                Ok(value) => return Some(value),
                Err(e) => debug!("{quantity} read {attempt}/{} failed: {e}", self.attempts),
            }
            if attempt < self.attempts && delay.delay(self.retry_delay) == DelayOutcome::Interrupted {
                break;
            }
        }
        warn!("{quantity} unavailable after {} attempts", self.attempts);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::{InstantDelay, ManualClock};
    use chrono::NaiveDate;

    /// Fails the first `failures` reads of each quantity.
    struct Flaky {
        failures: u32,
        temperature_reads: u32,
        humidity_reads: u32,
    }

    impl Flaky {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                temperature_reads: 0,
                humidity_reads: 0,
            }
        }
    }

    impl SensorPort for Flaky {
        fn read_temperature(&mut self) -> core::result::Result<f32, DriverError> {
            self.temperature_reads += 1;
            if self.temperature_reads <= self.failures {
                Err(DriverError::Bus("nack".into()))
            } else {
                Ok(21.5)
            }
        }

        fn read_humidity(&mut self) -> core::result::Result<f32, DriverError> {
            self.humidity_reads += 1;
            if self.humidity_reads <= self.failures {
                Err(DriverError::Crc { got: 1, expected: 2 })
            } else {
                Ok(48.0)
            }
        }
    }

    fn clock() -> ManualClock {
        ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(7, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn succeeds_on_last_attempt() {
        let mut sampler = SensorSampler::new(Flaky::new(2), &SamplerConfig::default());
        let mut delay = InstantDelay::new();
        assert_eq!(sampler.sample_temperature(&mut delay), Some(21.5));
        assert_eq!(sampler.sensor().temperature_reads, 3);
        assert_eq!(delay.requested(), vec![Duration::from_secs(1); 2]);
    }

    #[test]
    fn exhaustion_is_none_without_trailing_wait() {
        let mut sampler = SensorSampler::new(Flaky::new(u32::MAX), &SamplerConfig::default());
        let mut delay = InstantDelay::new();
        assert_eq!(sampler.sample_humidity(&mut delay), None);
        assert_eq!(sampler.sensor().humidity_reads, 3);
        assert_eq!(delay.requested().len(), 2);
    }

    #[test]
    fn interrupt_stops_retrying() {
        let mut sampler = SensorSampler::new(Flaky::new(u32::MAX), &SamplerConfig::default());
        let mut delay = InstantDelay::new().interrupt_on_call(1);
        assert_eq!(sampler.sample_temperature(&mut delay), None);
        assert_eq!(sampler.sensor().temperature_reads, 1);
    }

    #[test]
    fn sample_and_log_writes_one_reading() {
        let mut sampler = SensorSampler::new(Flaky::new(1), &SamplerConfig::default());
        let mut log: Vec<TelemetryRecord> = Vec::new();
        let record = sampler
            .sample_and_log(&clock(), &mut InstantDelay::new(), &mut log)
            .unwrap()
            .unwrap();
        assert_eq!(log, vec![record]);
        assert_eq!(record.timestamp.hour, 7);
    }

    #[test]
    fn failed_humidity_drops_the_reading() {
        struct NoHumidity;
        impl SensorPort for NoHumidity {
            fn read_temperature(&mut self) -> core::result::Result<f32, DriverError> {
                Ok(20.0)
            }
            fn read_humidity(&mut self) -> core::result::Result<f32, DriverError> {
                Err(DriverError::Bus("no ack".into()))
            }
        }

        let mut sampler = SensorSampler::new(NoHumidity, &SamplerConfig::default());
        let mut log: Vec<TelemetryRecord> = Vec::new();
        let outcome = sampler
            .sample_and_log(&clock(), &mut InstantDelay::new(), &mut log)
            .unwrap();
        assert!(outcome.is_none());
        assert!(log.is_empty());
    }
}
