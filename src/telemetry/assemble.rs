//! Date-range assembly over rotated log files.
//!
//! ```text
//!  list dir ─▶ parse names ─▶ keep [start, end] ─▶ sort ─▶ concat ─▶ LogScanner
//!   (skip pointer,  (skip what      (creation date,              (temp file,
//!    non-files)      doesn't parse)  inclusive)                   removed on drop)
//! ```
//!
//! "Nothing matched" is [`RangeOutcome::NotFound`], distinct from both an
//! I/O failure and an empty-but-successful scan, so callers can tell the
//! user there is no data instead of printing nothing.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use tempfile::NamedTempFile;

use super::record::{TelemetryRecord, Timestamp};
use super::scanner::LogScanner;
use crate::config::LogConfig;
use crate::error::{Error, Result};

/// A rotated log file and its parsed creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub created: NaiveDateTime,
    pub path: PathBuf,
}

/// Result of a range query.
#[derive(Debug)]
pub enum RangeOutcome {
    Found(MergedLog),
    NotFound,
}

/// Counters from a completed merged scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub records: u64,
    pub corrupt: u64,
    pub trailing_bytes: usize,
}

/// The concatenation of the matching files, in chronological order.
///
/// Owns a transient file that is deleted when this value is dropped, on
/// every exit path.
#[derive(Debug)]
pub struct MergedLog {
    file: NamedTempFile,
    sources: Vec<PathBuf>,
}

impl MergedLog {
    /// Files that went into the merge, oldest first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// A fresh scanner over the merged bytes.
    pub fn scanner(&self) -> Result<LogScanner<BufReader<File>>> {
        let file = self
            .file
            .reopen()
            .map_err(|e| Error::storage(self.file.path(), e))?;
        Ok(LogScanner::new(BufReader::new(file)))
    }

    /// Feed every valid record to `visit`, consuming the merge.  The merged
    /// file is gone when this returns, whether `visit` succeeded or not.
    pub fn for_each_record<E: From<Error>>(
        self,
        mut visit: impl FnMut(&TelemetryRecord) -> core::result::Result<(), E>,
    ) -> core::result::Result<ScanSummary, E> {
        let mut records = self.scanner()?.records();
        let mut summary = ScanSummary::default();
        for record in records.by_ref() {
            visit(&record)?;
            summary.records += 1;
        }
        summary.corrupt = records.corrupt_count();
        summary.trailing_bytes = records.scanner().trailing_bytes();
        if let Some(e) = records.scanner_mut().take_error() {
            return Err(Error::storage(self.file.path(), e).into());
        }
        Ok(summary)
    }
}

/// Locates, filters and concatenates rotated log files.
#[derive(Debug, Clone)]
pub struct DateRangeAssembler {
    dir: PathBuf,
    pointer_name: String,
    scratch: PathBuf,
}

impl DateRangeAssembler {
    pub fn new(config: &LogConfig) -> Self {
        Self::for_dir(&config.dir, &config.pointer_name)
    }

    pub fn for_dir(dir: &Path, pointer_name: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            pointer_name: pointer_name.to_owned(),
            scratch: std::env::temp_dir(),
        }
    }

    /// Directory for the transient merged file (default: the system temp
    /// dir, so it never shows up in the log directory listing).
    pub fn with_scratch_dir(mut self, scratch: impl Into<PathBuf>) -> Self {
        self.scratch = scratch.into();
        self
    }

    /// Every rotated log file in the directory, oldest first.
    pub fn list(&self) -> Result<Vec<LogEntry>> {
        let read_dir = fs::read_dir(&self.dir).map_err(|e| Error::storage(&self.dir, e))?;
        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| Error::storage(&self.dir, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name == self.pointer_name {
                continue;
            }
            let is_file = entry
                .file_type()
                .map_err(|e| Error::storage(entry.path(), e))?
                .is_file();
            let created = Timestamp::parse_stamp(name).and_then(Timestamp::to_datetime);
            match created {
                Some(created) if is_file => entries.push(LogEntry {
                    created,
                    path: entry.path(),
                }),
                _ => debug!("skipping '{name}': not a log file"),
            }
        }
        entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.path.cmp(&b.path)));
        Ok(entries)
    }

    /// Files whose creation date lies in `[start, end]`, oldest first.
    pub fn select(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<LogEntry>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|e| (start..=end).contains(&e.created.date()))
            .collect())
    }

    /// Concatenate the matching files into one transient stream.
    pub fn assemble(&self, start: NaiveDate, end: NaiveDate) -> Result<RangeOutcome> {
        let selected = self.select(start, end)?;
        if selected.is_empty() {
            debug!("no logs between {start} and {end}");
            return Ok(RangeOutcome::NotFound);
        }

        let file = tempfile::Builder::new()
            .prefix("ghmerge-")
            .tempfile_in(&self.scratch)
            .map_err(|e| Error::storage(&self.scratch, e))?;
        let mut out = BufWriter::new(file.as_file());
        for entry in &selected {
            let mut src = File::open(&entry.path).map_err(|e| Error::storage(&entry.path, e))?;
            io::copy(&mut src, &mut out).map_err(|e| Error::storage(&entry.path, e))?;
        }
        out.flush().map_err(|e| Error::storage(file.path(), e))?;
        drop(out);

        debug!(
            "merged {} log files into {}",
            selected.len(),
            file.path().display()
        );
        Ok(RangeOutcome::Found(MergedLog {
            file,
            sources: selected.into_iter().map(|e| e.path).collect(),
        }))
    }
}
