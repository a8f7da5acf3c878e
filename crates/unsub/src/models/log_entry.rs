//! Durable record of one unsubscribe attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageId, MessageMeta};

/// Outcome of visiting one unsubscribe link
///
/// The serialized names match the log files written by earlier versions of
/// the tool, so existing logs keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttemptStatus {
    /// A control that looked like an unsubscribe button was clicked
    Unsubscribed,
    /// The page loaded but offered nothing recognizable to click
    #[serde(rename = "No action needed", alias = "NoActionNeeded")]
    NoActionNeeded,
    /// Navigation or click failed; the message is retried on the next run
    Failed,
}

impl AttemptStatus {
    /// Whether this status closes the idempotence gate for later runs
    pub fn is_settled(self) -> bool {
        !matches!(self, AttemptStatus::Failed)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptStatus::Unsubscribed => "Unsubscribed",
            AttemptStatus::NoActionNeeded => "No action needed",
            AttemptStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Result of one link visit, before it is tied to message metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAttempt {
    pub link: String,
    pub status: AttemptStatus,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl LinkAttempt {
    pub fn succeeded(link: impl Into<String>, clicked: bool) -> Self {
        Self {
            link: link.into(),
            status: if clicked {
                AttemptStatus::Unsubscribed
            } else {
                AttemptStatus::NoActionNeeded
            },
            error: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn failed(link: impl Into<String>, error: impl ToString) -> Self {
        Self {
            link: link.into(),
            status: AttemptStatus::Failed,
            error: Some(error.to_string()),
            attempted_at: Utc::now(),
        }
    }
}

/// One row of the automation log, keyed by `message_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub message_id: MessageId,
    pub link: String,
    pub subject: String,
    pub from: String,
    pub received_at: String,
    pub status: AttemptStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LogEntry {
    /// Tie a link attempt to the message it came from
    pub fn from_attempt(meta: &MessageMeta, attempt: LinkAttempt) -> Self {
        Self {
            message_id: meta.id.clone(),
            link: attempt.link,
            subject: meta.subject.clone(),
            from: meta.from.clone(),
            received_at: meta.received_at.clone(),
            status: attempt.status,
            timestamp: attempt.attempted_at,
            error: attempt.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&AttemptStatus::NoActionNeeded).unwrap(),
            "\"No action needed\""
        );
        let parsed: AttemptStatus = serde_json::from_str("\"NoActionNeeded\"").unwrap();
        assert_eq!(parsed, AttemptStatus::NoActionNeeded);
    }

    #[test]
    fn test_only_failed_is_unsettled() {
        assert!(AttemptStatus::Unsubscribed.is_settled());
        assert!(AttemptStatus::NoActionNeeded.is_settled());
        assert!(!AttemptStatus::Failed.is_settled());
    }

    #[test]
    fn test_entry_reads_log_written_by_older_versions() {
        let json = r#"{
            "subject": "Deals",
            "receivedAt": "Mon, 1 Jan 2024 10:00:00 +0000",
            "from": "Shop <news@shop.test>",
            "link": "https://shop.test/unsubscribe",
            "messageId": "18c1",
            "status": "Failed",
            "timestamp": "2024-01-01T10:00:05.000Z",
            "error": "Navigation timeout of 60000 ms exceeded"
        }"#;
        let entry: LogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.message_id.as_str(), "18c1");
        assert_eq!(entry.status, AttemptStatus::Failed);
        assert!(entry.error.unwrap().contains("timeout"));
    }

    #[test]
    fn test_error_omitted_when_absent() {
        let meta = MessageMeta {
            id: MessageId::new("m1"),
            subject: "s".into(),
            from: "f".into(),
            received_at: "d".into(),
        };
        let entry = LogEntry::from_attempt(&meta, LinkAttempt::succeeded("https://x.test", true));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"messageId\":\"m1\""));
    }
}
