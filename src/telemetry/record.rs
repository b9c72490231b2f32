//! Fixed-width telemetry record codec.
//!
//! Wire format (no header, no length prefix, boundaries are positional):
//! ```text
//! ┌──────┬───────┬─────┬──────┬────────┬────────┬──────┬──────────┬──────────┐
//! │ year │ month │ day │ hour │ minute │ second │ kind │ payload0 │ payload1 │
//! └──────┴───────┴─────┴──────┴────────┴────────┴──────┴──────────┴──────────┘
//!   9 × f32, little-endian = 36 bytes
//! ```
//!
//! | kind | payload0        | payload1       |
//! |------|-----------------|----------------|
//! | 0    | temperature (C) | humidity (%rh) |
//! | 1    | valve id        | 0              |
//!
//! [`RawRecord`] is the total, unvalidated 9-field view.  [`decode`] is the
//! single place where the kind tag is interpreted into a [`TelemetryRecord`].

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::config::ValveId;
use crate::error::CorruptRecord;

pub const FIELD_COUNT: usize = 9;
pub const FIELD_SIZE: usize = 4;
pub const RECORD_SIZE: usize = FIELD_COUNT * FIELD_SIZE;

const KIND_FIELD: usize = 6;
const PAYLOAD_FIELD: usize = 7;

// ───────────────────────────────────────────────────────────────
// Timestamp
// ───────────────────────────────────────────────────────────────

/// Calendar timestamp as stored in records and in log file names.
///
/// Field order makes the derived `Ord` chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    /// `None` if the components do not form a real date-time.
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(i32::from(self.year), self.month.into(), self.day.into())?
            .and_hms_opt(self.hour.into(), self.minute.into(), self.second.into())
    }

    /// Log file name for a file created at this instant.
    pub fn stamp(self) -> String {
        format!(
            "{:04}_{:02}_{:02}_{:02}_{:02}_{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }

    /// Parse a log file name back into its creation timestamp.
    ///
    /// Accepts zero-padded and unpadded components.  Returns `None` for
    /// anything else, including impossible dates.
    pub fn parse_stamp(name: &str) -> Option<Self> {
        let mut parts = [0u16; 6];
        let mut split = name.split('_');
        for slot in &mut parts {
            let part = split.next()?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            *slot = part.parse().ok()?;
        }
        if split.next().is_some() {
            return None;
        }

        let [year, rest @ ..] = parts;
        let mut small = [0u8; 5];
        for (dst, src) in small.iter_mut().zip(rest) {
            *dst = u8::try_from(src).ok()?;
        }
        let [month, day, hour, minute, second] = small;
        let ts = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        };
        ts.to_datetime().map(|_| ts)
    }

    fn fields(self) -> [f32; 6] {
        [
            f32::from(self.year),
            f32::from(self.month),
            f32::from(self.day),
            f32::from(self.hour),
            f32::from(self.minute),
            f32::from(self.second),
        ]
    }

    fn from_fields(f: &[f32]) -> Self {
        Self {
            year: f[0] as u16,
            month: f[1] as u8,
            day: f[2] as u8,
            hour: f[3] as u8,
            minute: f[4] as u8,
            second: f[5] as u8,
        }
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%b-%d %H:%M:%S")),
            None => write!(
                f,
                "{}-{}-{} {:02}:{:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.minute, self.second
            ),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Raw record
// ───────────────────────────────────────────────────────────────

/// Record type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum RecordKind {
    SensorReading = 0,
    ValveCommand = 1,
}

impl RecordKind {
    #[allow(clippy::float_cmp)]
    pub fn from_tag(tag: f32) -> Option<Self> {
        if tag == 0.0 {
            Some(Self::SensorReading)
        } else if tag == 1.0 {
            Some(Self::ValveCommand)
        } else {
            None
        }
    }

    pub fn tag(self) -> f32 {
        f32::from(self as u8)
    }
}

/// Nine decoded fields, kind not yet validated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord(pub [f32; FIELD_COUNT]);

impl RawRecord {
    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        let mut fields = [0f32; FIELD_COUNT];
        for (field, chunk) in fields.iter_mut().zip(bytes.chunks_exact(FIELD_SIZE)) {
            let mut le = [0u8; FIELD_SIZE];
            le.copy_from_slice(chunk);
            *field = f32::from_le_bytes(le);
        }
        Self(fields)
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        for (chunk, field) in out.chunks_exact_mut(FIELD_SIZE).zip(self.0) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }

    pub fn kind_tag(&self) -> f32 {
        self.0[KIND_FIELD]
    }

    pub fn kind(&self) -> Option<RecordKind> {
        RecordKind::from_tag(self.kind_tag())
    }

    /// True if the kind tag is one of the recognised record types.
    pub fn is_valid(&self) -> bool {
        self.kind().is_some()
    }
}

// ───────────────────────────────────────────────────────────────
// Typed record
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RecordBody {
    SensorReading { temperature_c: f32, humidity_pct: f32 },
    ValveCommand { valve: ValveId },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: Timestamp,
    pub body: RecordBody,
}

impl TelemetryRecord {
    pub fn sensor_reading(at: NaiveDateTime, temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            timestamp: at.into(),
            body: RecordBody::SensorReading {
                temperature_c,
                humidity_pct,
            },
        }
    }

    pub fn valve_command(at: NaiveDateTime, valve: ValveId) -> Self {
        Self {
            timestamp: at.into(),
            body: RecordBody::ValveCommand { valve },
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self.body {
            RecordBody::SensorReading { .. } => RecordKind::SensorReading,
            RecordBody::ValveCommand { .. } => RecordKind::ValveCommand,
        }
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.body {
            RecordBody::SensorReading {
                temperature_c,
                humidity_pct,
            } => write!(
                f,
                "{} {:.2} degC, {:.2} %rh",
                self.timestamp, temperature_c, humidity_pct
            ),
            RecordBody::ValveCommand { valve } => {
                write!(f, "{} Valve command {} was issued", self.timestamp, valve)
            }
        }
    }
}

/// Encode a record into its nine fields.  Pure and total.
pub fn encode(record: &TelemetryRecord) -> RawRecord {
    let mut fields = [0f32; FIELD_COUNT];
    fields[..KIND_FIELD].copy_from_slice(&record.timestamp.fields());
    fields[KIND_FIELD] = record.kind().tag();
    match record.body {
        RecordBody::SensorReading {
            temperature_c,
            humidity_pct,
        } => {
            fields[PAYLOAD_FIELD] = temperature_c;
            fields[PAYLOAD_FIELD + 1] = humidity_pct;
        }
        RecordBody::ValveCommand { valve } => {
            fields[PAYLOAD_FIELD] = f32::from(valve.0);
        }
    }
    RawRecord(fields)
}

/// Interpret nine fields as a typed record.
pub fn decode(raw: &RawRecord) -> Result<TelemetryRecord, CorruptRecord> {
    let f = &raw.0;
    let kind = raw.kind().ok_or(CorruptRecord { tag: raw.kind_tag() })?;
    let body = match kind {
        RecordKind::SensorReading => RecordBody::SensorReading {
            temperature_c: f[PAYLOAD_FIELD],
            humidity_pct: f[PAYLOAD_FIELD + 1],
        },
        RecordKind::ValveCommand => RecordBody::ValveCommand {
            valve: ValveId(f[PAYLOAD_FIELD] as u8),
        },
    };
    Ok(TelemetryRecord {
        timestamp: Timestamp::from_fields(&f[..KIND_FIELD]),
        body,
    })
}

impl TryFrom<RawRecord> for TelemetryRecord {
    type Error = CorruptRecord;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        decode(&raw)
    }
}
