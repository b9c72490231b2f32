//! Fuzz target: `repair_stream`
//!
//! Repairs arbitrary bytes and checks the output is a whole number of
//! records, all with a recognised kind, and that repairing it again is a
//! no-op.
//!
//! cargo fuzz run fuzz_log_repair

#![no_main]

use std::path::Path;

use greenhouse::telemetry::LogScanner;
use greenhouse::telemetry::record::RECORD_SIZE;
use greenhouse::telemetry::repair::repair_stream;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut cleaned = Vec::new();
    let report = repair_stream(data, &mut cleaned, Path::new("fuzz-in"), Path::new("fuzz-out")).expect("in-memory repair");
    assert_eq!(cleaned.len() % RECORD_SIZE, 0);
    assert_eq!(report.kept as usize, cleaned.len() / RECORD_SIZE);
    assert!(LogScanner::new(cleaned.as_slice()).all(|r| r.is_valid()));

    let mut again = Vec::new();
    let second = repair_stream(cleaned.as_slice(), &mut again, Path::new("fuzz-in"), Path::new("fuzz-out")).expect("in-memory repair");
    assert!(second.is_clean());
    assert_eq!(again, cleaned);
});
