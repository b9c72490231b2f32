//! Log repair: copy a log keeping only records with a recognised kind.
//!
//! The source is never modified in place.  [`repair_file`] writes a new
//! artifact and refuses a destination that is the source itself;
//! [`replace_with_repaired`] additionally renames that artifact over the
//! source, for callers that opt in.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::scanner::LogScanner;
use crate::error::{Error, Result};

/// What a repair pass kept and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub kept: u64,
    pub dropped: u64,
    /// Bytes after the last whole record; never copied.
    pub trailing_bytes: usize,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.dropped == 0 && self.trailing_bytes == 0
    }
}

/// Filter `reader` into `writer`.  Read failures name `source` in the
/// error, write failures name `dest`.
pub fn repair_stream<R: Read, W: Write>(
    reader: R,
    mut writer: W,
    source: &Path,
    dest: &Path,
) -> Result<RepairReport> {
    let mut scanner = LogScanner::new(reader);
    let mut report = RepairReport::default();
    while let Some(raw) = scanner.next() {
        if raw.is_valid() {
            writer
                .write_all(&raw.to_bytes())
                .map_err(|e| Error::storage(dest, e))?;
            report.kept += 1;
        } else {
            warn!(
                "dropping record {} with kind tag {}",
                scanner.scanned(),
                raw.kind_tag()
            );
            report.dropped += 1;
        }
    }
    if let Some(e) = scanner.take_error() {
        return Err(Error::storage(source, e));
    }
    report.trailing_bytes = scanner.trailing_bytes();
    writer.flush().map_err(|e| Error::storage(dest, e))?;
    Ok(report)
}

/// Write a cleaned copy of `src` to `dst`.
///
/// The copy is built in a temporary file next to `dst` and renamed into
/// place once complete.  A `dst` that is the same file as `src` (same path,
/// symlink or hard link) is rejected before anything is written.
pub fn repair_file(src: &Path, dst: &Path) -> Result<RepairReport> {
    let input = File::open(src).map_err(|e| Error::storage(src, e))?;
    if is_same_file(&input, src, dst)? {
        return Err(Error::storage(
            dst,
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("repair output is the source log {}", src.display()),
            ),
        ));
    }

    let mut tmp = scratch_beside(dst)?;
    let report = repair_stream(BufReader::new(input), BufWriter::new(tmp.as_file_mut()), src, dst)?;
    tmp.persist(dst).map_err(|e| Error::storage(dst, e.error))?;
    info!(
        "repaired {} -> {}: kept {}, dropped {}",
        src.display(),
        dst.display(),
        report.kept,
        report.dropped
    );
    Ok(report)
}

/// Repair `src` and atomically swap the cleaned copy into its place.
pub fn replace_with_repaired(src: &Path) -> Result<RepairReport> {
    let input = File::open(src).map_err(|e| Error::storage(src, e))?;
    let mut tmp = scratch_beside(src)?;
    let tmp_path = tmp.path().to_path_buf();
    let report = repair_stream(
        BufReader::new(input),
        BufWriter::new(tmp.as_file_mut()),
        src,
        &tmp_path,
    )?;

    // Keep the original's permission bits on the replacement.
    let perms = fs::metadata(src)
        .map_err(|e| Error::storage(src, e))?
        .permissions();
    tmp.as_file()
        .set_permissions(perms)
        .map_err(|e| Error::storage(&tmp_path, e))?;
    tmp.persist(src).map_err(|e| Error::storage(src, e.error))?;
    info!(
        "repaired {} in place: kept {}, dropped {}",
        src.display(),
        report.kept,
        report.dropped
    );
    Ok(report)
}

/// True if `dst` exists and is the very file `input` was opened from.
fn is_same_file(input: &File, src: &Path, dst: &Path) -> Result<bool> {
    let source = input.metadata().map_err(|e| Error::storage(src, e))?;
    match fs::metadata(dst) {
        Ok(target) => Ok(source.dev() == target.dev() && source.ino() == target.ino()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::storage(dst, e)),
    }
}

/// An anonymous temporary file in the directory that will hold `path`.
fn scratch_beside(path: &Path) -> Result<NamedTempFile> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    tempfile::Builder::new()
        .prefix(".repair-")
        .tempfile_in(dir)
        .map_err(|e| Error::storage(dir, e))
}
