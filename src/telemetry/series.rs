//! Plot-ready series extracted from a record stream.
//!
//! Readings become one point each.  A valve command becomes a watering
//! marker drawn on the temperature curve at the most recent reading's value;
//! commands seen before any reading have nothing to sit on and are skipped.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::record::{RecordBody, TelemetryRecord};
use crate::config::ValveId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingPoint {
    pub at: NaiveDateTime,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WateringMarker {
    pub at: NaiveDateTime,
    pub valve: ValveId,
    /// Temperature of the reading the marker is overlaid on.
    pub temperature_c: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub readings: Vec<ReadingPoint>,
    pub watering: Vec<WateringMarker>,
    /// Records whose timestamp is not a real calendar instant.
    pub skipped: usize,
}

impl Series {
    pub fn from_records(records: impl IntoIterator<Item = TelemetryRecord>) -> Self {
        let mut series = Self::default();
        for record in records {
            series.push(&record);
        }
        series
    }

    pub fn push(&mut self, record: &TelemetryRecord) {
        let Some(at) = record.timestamp.to_datetime() else {
            self.skipped += 1;
            return;
        };
        match record.body {
            RecordBody::SensorReading {
                temperature_c,
                humidity_pct,
            } => self.readings.push(ReadingPoint {
                at,
                temperature_c,
                humidity_pct,
            }),
            RecordBody::ValveCommand { valve } => {
                if let Some(last) = self.readings.last() {
                    self.watering.push(WateringMarker {
                        at,
                        valve,
                        temperature_c: last.temperature_c,
                    });
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty() && self.watering.is_empty()
    }
}
