//! Progress reporting to the hosting shell
//!
//! The pipeline emits two kinds of events: free-form lines (retries, skips,
//! failures, milestones) and one structured summary per processed message.
//! Any transport satisfies [`ProgressSink`]; the wire shape of
//! [`ProgressEvent`] matches what the desktop UI listens for
//! (`{"type": "log" | "email-data", "data": ...}`).

use log::info;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

use crate::models::{MessageId, MessageMeta};

/// Overall result for one message as shown in the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SummaryStatus {
    /// Candidate links were found and handed to the actor
    Done,
    /// No candidate links in any part
    Nothing,
    /// Already settled in the automation log; no work was done
    Skipped,
}

/// Structured per-message record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub from: String,
    pub message_id: MessageId,
    pub subject: String,
    pub received_at: String,
    pub is_newsletter: bool,
    pub status: SummaryStatus,
}

impl MessageSummary {
    pub fn new(meta: &MessageMeta, links_found: usize) -> Self {
        Self {
            from: meta.from.clone(),
            message_id: meta.id.clone(),
            subject: meta.subject.clone(),
            received_at: meta.received_at.clone(),
            is_newsletter: links_found > 0,
            status: if links_found > 0 {
                SummaryStatus::Done
            } else {
                SummaryStatus::Nothing
            },
        }
    }

    /// Summary for a message the idempotence gate skipped (headers unknown)
    pub fn skipped(id: &MessageId) -> Self {
        Self {
            from: String::new(),
            message_id: id.clone(),
            subject: String::new(),
            received_at: String::new(),
            is_newsletter: true,
            status: SummaryStatus::Skipped,
        }
    }
}

/// One event as delivered to a UI process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ProgressEvent {
    #[serde(rename = "log")]
    Line(String),
    #[serde(rename = "email-data")]
    Record(MessageSummary),
}

/// Receiver of pipeline progress
pub trait ProgressSink: Send + Sync {
    fn line(&self, text: &str);
    fn record(&self, summary: &MessageSummary);
}

/// Routes progress through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn line(&self, text: &str) {
        info!(target: "unsub::progress", "{}", text);
    }

    fn record(&self, summary: &MessageSummary) {
        info!(
            target: "unsub::progress",
            "[{:?}] {} | {} | {}",
            summary.status, summary.message_id, summary.from, summary.subject
        );
    }
}

/// Writes one JSON event per line (e.g. to stdout for a UI parent process)
pub struct JsonLinesSink<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    fn emit(&self, event: &ProgressEvent) {
        let Ok(mut out) = self.out.lock() else {
            return;
        };
        // A closed pipe on the UI side must not take the pipeline down
        if serde_json::to_writer(&mut *out, event).is_ok() {
            let _ = writeln!(out);
            let _ = out.flush();
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.out.into_inner().ok()
    }
}

impl<W: Write + Send> ProgressSink for JsonLinesSink<W> {
    fn line(&self, text: &str) {
        self.emit(&ProgressEvent::Line(text.to_string()));
    }

    fn record(&self, summary: &MessageSummary) {
        self.emit(&ProgressEvent::Record(summary.clone()));
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Line(line) => Some(line),
                ProgressEvent::Record(_) => None,
            })
            .collect()
    }

    pub fn records(&self) -> Vec<MessageSummary> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Record(summary) => Some(summary),
                ProgressEvent::Line(_) => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ProgressSink for MemorySink {
    fn line(&self, text: &str) {
        self.push(ProgressEvent::Line(text.to_string()));
    }

    fn record(&self, summary: &MessageSummary) {
        self.push(ProgressEvent::Record(summary.clone()));
    }
}
