//! JSON file backed automation log
//!
//! The whole file is read on every access and rewritten on every merge.
//! Writes go to a temporary file in the same directory which is then renamed
//! over the log, so readers see either the old or the new array, never a
//! partial one.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{overlay, settled_links_of};
use super::AutomationLog;
use crate::models::{AttemptStatus, ConfigError, LogEntry, MessageId};

/// Automation log stored as a pretty-printed JSON array
pub struct JsonFileLog {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_guard: Mutex<()>,
}

impl JsonFileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all entries. A missing, empty or unparsable file reads as empty.
    fn read_all(&self) -> Result<Vec<LogEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read automation log: {}", self.path.display())
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(
                    "Automation log {} is not valid JSON ({}); starting from an empty log",
                    self.path.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    fn write_all(&self, entries: &[LogEntry]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, entries).context("Failed to serialize log")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace automation log: {}", self.path.display()))?;

        debug!("Wrote {} log entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

impl AutomationLog for JsonFileLog {
    fn merge(&self, entries: &[LogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| anyhow::anyhow!("automation log lock poisoned"))?;

        let mut stored = self.read_all()?;
        overlay(&mut stored, entries);
        self.write_all(&stored)
    }

    fn status_of(&self, id: &MessageId) -> Result<Option<AttemptStatus>> {
        Ok(self
            .read_all()?
            .into_iter()
            .rev()
            .find(|e| &e.message_id == id)
            .map(|e| e.status))
    }

    fn settled_links(&self) -> Result<HashSet<String>> {
        Ok(settled_links_of(&self.read_all()?))
    }

    fn entries(&self) -> Result<Vec<LogEntry>> {
        self.read_all()
    }
}

/// Exclusive marker file held next to the log for the duration of a run
///
/// Created with `create_new`, so a second holder fails immediately. The file
/// is removed when the lock is dropped; a crash leaves it behind and it has
/// to be deleted by hand.
#[derive(Debug)]
pub struct LogLock {
    path: PathBuf,
}

impl LogLock {
    pub fn acquire(log_path: &Path) -> Result<Self> {
        let mut lock_path = log_path.as_os_str().to_owned();
        lock_path.push(".lock");
        let path = PathBuf::from(lock_path);

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ConfigError::LogLocked(log_path.to_path_buf()).into());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create lock file: {}", path.display()));
            }
        };
        writeln!(file, "{}", std::process::id())?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LogLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), e);
        }
    }
}
