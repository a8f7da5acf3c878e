//! Automation log trait definitions

use std::collections::HashSet;

use anyhow::Result;

use crate::models::{AttemptStatus, LogEntry, MessageId};

/// Persistent record of unsubscribe attempts, keyed by message id
///
/// Implementations hold at most one entry per message id. A merge overlays
/// new entries on the stored ones and the newer entry wins on collision.
pub trait AutomationLog: Send + Sync {
    /// Overlay `entries` on the stored log (last write wins per message id)
    fn merge(&self, entries: &[LogEntry]) -> Result<()>;

    /// Status recorded for a message, if any
    fn status_of(&self, id: &MessageId) -> Result<Option<AttemptStatus>>;

    /// Links whose recorded attempt did not fail
    fn settled_links(&self) -> Result<HashSet<String>>;

    /// All entries in storage order
    fn entries(&self) -> Result<Vec<LogEntry>>;

    /// Whether the message already has a non-failed attempt on record
    fn is_settled(&self, id: &MessageId) -> Result<bool> {
        Ok(self.status_of(id)?.is_some_and(AttemptStatus::is_settled))
    }
}

/// Overlay `incoming` on `existing`, keyed by message id.
///
/// Replaced entries keep their position; new ids are appended in order.
/// Later duplicates inside `incoming` replace earlier ones.
pub fn overlay(existing: &mut Vec<LogEntry>, incoming: &[LogEntry]) {
    let mut index: std::collections::HashMap<MessageId, usize> = existing
        .iter()
        .enumerate()
        .map(|(i, e)| (e.message_id.clone(), i))
        .collect();

    for entry in incoming {
        match index.get(&entry.message_id) {
            Some(&i) => existing[i] = entry.clone(),
            None => {
                index.insert(entry.message_id.clone(), existing.len());
                existing.push(entry.clone());
            }
        }
    }
}

/// Collect the links of entries whose status is settled
pub fn settled_links_of(entries: &[LogEntry]) -> HashSet<String> {
    entries
        .iter()
        .filter(|e| e.status.is_settled())
        .map(|e| e.link.clone())
        .collect()
}
