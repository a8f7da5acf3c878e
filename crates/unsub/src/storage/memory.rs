//! In-memory automation log
//!
//! Used by tests and dry runs; nothing survives the process.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::RwLock;

use super::traits::{overlay, settled_links_of};
use super::AutomationLog;
use crate::models::{AttemptStatus, LogEntry, MessageId};

/// In-memory implementation of AutomationLog
#[derive(Default)]
pub struct InMemoryLog {
    entries: RwLock<Vec<LogEntry>>,
}

impl InMemoryLog {
    /// Create a new empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log pre-populated with entries
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        let log = Self::new();
        if let Ok(mut guard) = log.entries.write() {
            overlay(&mut guard, &entries);
        }
        log
    }

    fn poisoned() -> anyhow::Error {
        anyhow::anyhow!("automation log lock poisoned")
    }
}

impl AutomationLog for InMemoryLog {
    fn merge(&self, entries: &[LogEntry]) -> Result<()> {
        let mut guard = self.entries.write().map_err(|_| Self::poisoned())?;
        overlay(&mut guard, entries);
        Ok(())
    }

    fn status_of(&self, id: &MessageId) -> Result<Option<AttemptStatus>> {
        let guard = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(guard.iter().find(|e| &e.message_id == id).map(|e| e.status))
    }

    fn settled_links(&self) -> Result<HashSet<String>> {
        let guard = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(settled_links_of(&guard))
    }

    fn entries(&self) -> Result<Vec<LogEntry>> {
        let guard = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(guard.clone())
    }
}
