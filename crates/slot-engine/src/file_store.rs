//! JSON-file calendar backend for offline use.
//!
//! Every call loads the file, applies the change and writes it back, so two
//! `slotctl` invocations see each other's writes. Writers hold an exclusive
//! advisory lock on a `<file>.lock` sidecar across load, modify and save, and
//! replace the file through a temporary sibling so readers never see a
//! partial write. A missing file reads as an empty calendar in the configured
//! timezone and is created on first write.

use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::error::GatewayError;
use crate::gateway::{CalendarEvent, CalendarGateway, NewEvent};
use crate::memory::CalendarBook;

#[derive(Debug, Clone)]
pub struct FileCalendar {
    path: PathBuf,
    timezone: Tz,
}

impl FileCalendar {
    /// `timezone` is used only when the file does not exist yet.
    pub fn new(path: impl AsRef<Path>, timezone: Tz) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            timezone,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Open the sidecar and take the advisory lock. Dropping the handle
    /// releases it.
    fn lock(&self, exclusive: bool) -> Result<File, GatewayError> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| io_error("open", &lock_path, e))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| io_error("lock", &lock_path, e))?;
        Ok(file)
    }

    /// Load under a shared lock.
    fn read(&self) -> Result<CalendarBook, GatewayError> {
        if !self.path.exists() {
            return Ok(CalendarBook::new(self.timezone));
        }
        let _guard = self.lock(false)?;
        self.load()
    }

    /// Load, apply `change` and save, all under one exclusive lock. Nothing
    /// is written when `change` fails.
    fn update<T>(
        &self,
        change: impl FnOnce(&mut CalendarBook) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let _guard = self.lock(true)?;
        let mut book = self.load()?;
        let value = change(&mut book)?;
        self.save(&book)?;
        Ok(value)
    }

    fn load(&self) -> Result<CalendarBook, GatewayError> {
        if !self.path.exists() {
            return Ok(CalendarBook::new(self.timezone));
        }
        let raw =
            std::fs::read_to_string(&self.path).map_err(|e| io_error("read", &self.path, e))?;
        serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Malformed(format!("{}: {}", self.path.display(), e))
        })
    }

    fn save(&self, book: &CalendarBook) -> Result<(), GatewayError> {
        let json = serde_json::to_string_pretty(book)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| io_error("stage", dir, e))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| io_error("write", temp.path(), e))?;
        temp.persist(&self.path)
            .map_err(|e| io_error("replace", &self.path, e.error))?;
        Ok(())
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> GatewayError {
    GatewayError::Transport(format!("failed to {} {}: {}", action, path.display(), err))
}

impl CalendarGateway for FileCalendar {
    fn timezone(&self) -> Result<Tz, GatewayError> {
        self.read()?.zone()
    }

    fn list_events(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>, GatewayError> {
        Ok(self.read()?.list(start, end))
    }

    fn insert_event(&self, event: &NewEvent) -> Result<CalendarEvent, GatewayError> {
        self.update(|book| Ok(book.insert(event, "file")))
    }

    fn delete_event(&self, event_id: &str) -> Result<(), GatewayError> {
        self.update(|book| book.delete(event_id))
    }
}
