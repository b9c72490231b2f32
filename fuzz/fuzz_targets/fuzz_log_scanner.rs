//! Fuzz target: `LogScanner` / `Records`
//!
//! Drives arbitrary bytes through the record scanner and asserts that it
//! never panics, yields exactly `len / 36` raw records, reports the rest as
//! trailing bytes, and that the typed view accounts for every raw record
//! as either decoded or corrupt.
//!
//! cargo fuzz run fuzz_log_scanner

#![no_main]

use greenhouse::telemetry::LogScanner;
use greenhouse::telemetry::record::RECORD_SIZE;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut scanner = LogScanner::new(data);
    let raw = scanner.by_ref().count();
    assert_eq!(raw, data.len() / RECORD_SIZE);
    assert_eq!(scanner.trailing_bytes(), data.len() % RECORD_SIZE);
    assert!(scanner.take_error().is_none());

    let mut records = LogScanner::new(data).records();
    let decoded = records.by_ref().count() as u64;
    assert_eq!(decoded + records.corrupt_count(), raw as u64);
});
