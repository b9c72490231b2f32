//! Corruption-tolerant log replay.
//!
//! The scanner pulls fixed 36-byte strides out of any [`Read`] and yields
//! them as [`RawRecord`]s.  A stride that ends early is the defined
//! end-of-stream condition, never an error: it is either garbage at the end
//! of a damaged file or a record the writer has not finished appending yet.
//! This is what lets inspection tools read the active log while the
//! periodic job writes to it, without any locking.

use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

use log::{debug, warn};

use super::record::{RawRecord, TelemetryRecord, RECORD_SIZE, decode};

/// Lazy iterator over the raw records of a byte stream.
pub struct LogScanner<R> {
    reader: R,
    done: bool,
    scanned: u64,
    trailing: usize,
    error: Option<io::Error>,
}

impl LogScanner<BufReader<File>> {
    /// Open a log file for scanning.
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> LogScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
            scanned: 0,
            trailing: 0,
            error: None,
        }
    }

    /// Adapt into an iterator of typed records, skipping corrupt ones.
    pub fn records(self) -> Records<R> {
        Records {
            scanner: self,
            corrupt: 0,
        }
    }

    /// Complete strides yielded so far.
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// Bytes left over after the last complete stride (0 until the end).
    pub fn trailing_bytes(&self) -> usize {
        self.trailing
    }

    /// The I/O error that ended the scan early, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Fill one stride.  Returns the number of bytes read (< RECORD_SIZE
    /// only at end of stream).
    fn fill(&mut self, buf: &mut [u8; RECORD_SIZE]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < RECORD_SIZE {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read> Iterator for LogScanner<R> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        if self.done {
            return None;
        }

        let mut buf = [0u8; RECORD_SIZE];
        match self.fill(&mut buf) {
            Ok(RECORD_SIZE) => {
                self.scanned += 1;
                Some(RawRecord::from_bytes(&buf))
            }
            Ok(partial) => {
                if partial > 0 {
                    debug!("log ends with {partial} trailing bytes; ignored");
                }
                self.trailing = partial;
                self.done = true;
                None
            }
            Err(e) => {
                warn!("log scan stopped after {} records: {e}", self.scanned);
                self.error = Some(e);
                self.done = true;
                None
            }
        }
    }
}

/// Typed view over a [`LogScanner`].
pub struct Records<R> {
    scanner: LogScanner<R>,
    corrupt: u64,
}

impl<R: Read> Records<R> {
    /// Records dropped because their kind tag was unrecognised.
    pub fn corrupt_count(&self) -> u64 {
        self.corrupt
    }

    pub fn scanner(&self) -> &LogScanner<R> {
        &self.scanner
    }

    pub fn scanner_mut(&mut self) -> &mut LogScanner<R> {
        &mut self.scanner
    }
}

impl<R: Read> Iterator for Records<R> {
    type Item = TelemetryRecord;

    fn next(&mut self) -> Option<TelemetryRecord> {
        loop {
            let raw = self.scanner.next()?;
            match decode(&raw) {
                Ok(record) => return Some(record),
                Err(e) => {
                    self.corrupt += 1;
                    debug!("skipping record {}: {e}", self.scanner.scanned());
                }
            }
        }
    }
}
