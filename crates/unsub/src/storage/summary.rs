//! Per-status counts over the automation log

use serde::Serialize;

use crate::models::{AttemptStatus, LogEntry};

/// Counts of log entries by status
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LogSummary {
    pub total: usize,
    pub unsubscribed: usize,
    pub no_action_needed: usize,
    pub failed: usize,
}

impl LogSummary {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, entry| {
            acc.total += 1;
            match entry.status {
                AttemptStatus::Unsubscribed => acc.unsubscribed += 1,
                AttemptStatus::NoActionNeeded => acc.no_action_needed += 1,
                AttemptStatus::Failed => acc.failed += 1,
            }
            acc
        })
    }
}

impl std::fmt::Display for LogSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} messages logged: {} unsubscribed, {} no action needed, {} failed",
            self.total, self.unsubscribed, self.no_action_needed, self.failed
        )
    }
}
