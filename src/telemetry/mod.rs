//! Append-only binary telemetry log.
//!
//! | Module | Role |
//! |---|---|
//! | [`record`] | 36-byte record codec and typed records |
//! | [`scanner`] | corruption-tolerant replay of any byte stream |
//! | [`store`] | active-file rotation, pointer file, appends |
//! | [`assemble`] | date-range selection and concatenation |
//! | [`repair`] | copy a log keeping only well-formed records |
//! | [`series`] | plot-ready points from a record stream |

pub mod assemble;
pub mod record;
pub mod repair;
pub mod scanner;
pub mod series;
pub mod store;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;

pub use assemble::{DateRangeAssembler, MergedLog, RangeOutcome};
pub use record::{RecordBody, RecordKind, TelemetryRecord, Timestamp};
pub use scanner::LogScanner;
pub use store::LogStore;

use crate::error::{Error, Result};

/// Records from every log in `dir` created between `start` and `end`
/// inclusive.
pub fn query_range(
    dir: &Path,
    pointer_name: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RangeOutcome> {
    DateRangeAssembler::for_dir(dir, pointer_name).assemble(start, end)
}

/// Scan a single log file.
pub fn read_log(path: &Path) -> Result<LogScanner<BufReader<File>>> {
    LogScanner::open(path).map_err(|e| Error::storage(path, e))
}
