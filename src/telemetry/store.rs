//! Active log file ownership: freshness, rotation, pointer file, append.
//!
//! ## Directory layout
//!
//! ```text
//! ghlogs/
//! ├── current                 ← pointer: name of the active file
//! ├── 2024_05_26_06_00_02     ← rotated (archived) log
//! └── 2024_06_02_07_00_01     ← active log
//! ```
//!
//! A log file is named after its creation instant and stays active until
//! that instant is more than `max_age_days` whole days in the past.  Old
//! files are never deleted; they simply stop being pointed at.
//!
//! ## Single writer
//!
//! Only the periodic job writes here.  There is no cross-process lock:
//! concurrent writers are unsupported.  Readers are always safe because
//! each record is appended with one `write_all` on an `O_APPEND` handle
//! and the scanner ignores a short tail.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info};
use tempfile::NamedTempFile;

use super::record::{Timestamp, TelemetryRecord, encode};
use crate::adapters::ownership::FileOwner;
use crate::app::ports::{Clock, RecordSink};
use crate::config::LogConfig;
use crate::error::{Error, Result};

/// True while a file created at `created` is still the one to append to.
///
/// Staleness counts whole elapsed days, so a file created 7 days and 23
/// hours ago is still fresh with the default 7-day window.
pub fn is_fresh(created: NaiveDateTime, now: NaiveDateTime, max_age_days: u32) -> bool {
    (now - created).num_days() <= i64::from(max_age_days)
}

/// Owner of the log directory's active file and pointer.
pub struct LogStore<C> {
    dir: PathBuf,
    pointer_name: String,
    max_age_days: u32,
    owner: Option<FileOwner>,
    clock: C,
}

impl<C: Clock> LogStore<C> {
    /// Build a store over `config.dir`.  File ownership is left alone until
    /// [`with_owner`](Self::with_owner) is called.
    pub fn new(config: &LogConfig, clock: C) -> Self {
        Self {
            dir: config.dir.clone(),
            pointer_name: config.pointer_name.clone(),
            max_age_days: config.max_age_days,
            owner: None,
            clock,
        }
    }

    /// Hand every newly rotated file to `owner`.
    pub fn with_owner(mut self, owner: FileOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pointer_name(&self) -> &str {
        &self.pointer_name
    }

    pub fn pointer_path(&self) -> PathBuf {
        self.dir.join(&self.pointer_name)
    }

    /// Path of the file appends go to, rotating first if needed.
    pub fn active_log_file(&self) -> Result<PathBuf> {
        let pointer = self.pointer_path();
        let name = match self.read_pointer()? {
            Some(name) => name,
            None => {
                File::create(&pointer).map_err(|e| Error::storage(&pointer, e))?;
                debug!("created empty pointer file {}", pointer.display());
                String::new()
            }
        };

        if self.needs_rotation(&name) {
            let fresh = self.rotate()?;
            return Ok(self.dir.join(fresh));
        }
        Ok(self.dir.join(name))
    }

    /// Read-only lookup of the active file for inspection tools.  Never
    /// rotates or creates anything.
    pub fn current_log_file(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .read_pointer()?
            .filter(|name| !name.is_empty())
            .map(|name| self.dir.join(name)))
    }

    /// Append one record to the active file.  Returns the file written.
    pub fn append(&self, record: &TelemetryRecord) -> Result<PathBuf> {
        let path = self.active_log_file()?;
        let bytes = encode(record).to_bytes();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::storage(&path, e))?;
        file.write_all(&bytes).map_err(|e| Error::storage(&path, e))?;
        Ok(path)
    }

    // ── Internal ──────────────────────────────────────────────

    /// Pointer content (first line, trimmed); `None` if the file is absent.
    fn read_pointer(&self) -> Result<Option<String>> {
        let pointer = self.pointer_path();
        match fs::read_to_string(&pointer) {
            Ok(text) => Ok(Some(text.lines().next().unwrap_or("").trim().to_owned())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(pointer, e)),
        }
    }

    fn needs_rotation(&self, name: &str) -> bool {
        if name.is_empty() {
            return true;
        }
        let Some(created) = Timestamp::parse_stamp(name).and_then(Timestamp::to_datetime) else {
            debug!("pointer names unparsable log '{name}'");
            return true;
        };
        !is_fresh(created, self.clock.now(), self.max_age_days)
    }

    /// Create a new empty log file named after now and point at it.
    fn rotate(&self) -> Result<String> {
        let name = Timestamp::from(self.clock.now()).stamp();
        let path = self.dir.join(&name);

        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::storage(&path, e))?;
        if let Some(owner) = &self.owner {
            owner.apply(&path).map_err(|e| Error::storage(&path, e))?;
        }

        self.write_pointer(&name)?;
        info!("starting new log {}", path.display());
        Ok(name)
    }

    /// Replace the pointer atomically so a reader never sees half a name.
    fn write_pointer(&self, name: &str) -> Result<()> {
        let pointer = self.pointer_path();
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Error::storage(&self.dir, e))?;
        tmp.write_all(name.as_bytes())
            .map_err(|e| Error::storage(tmp.path(), e))?;
        tmp.as_file()
            .set_permissions(Permissions::from_mode(0o644))
            .map_err(|e| Error::storage(tmp.path(), e))?;
        tmp.persist(&pointer)
            .map_err(|e| Error::storage(&pointer, e.error))?;
        if let Some(owner) = &self.owner {
            owner.apply(&pointer).map_err(|e| Error::storage(&pointer, e))?;
        }
        Ok(())
    }
}

impl<C: Clock> RecordSink for LogStore<C> {
    fn append(&mut self, record: &TelemetryRecord) -> Result<()> {
        LogStore::append(self, record).map(|_| ())
    }
}
