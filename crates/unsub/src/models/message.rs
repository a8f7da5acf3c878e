//! Message model as handed to the processor by a mailbox provider

use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single header (name-value pair)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// One body part with inline data, still base64 encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Declared MIME type (e.g. "text/html"), if the provider sent one
    pub mime_type: Option<String>,
    /// Base64 payload exactly as the provider delivered it
    pub data: String,
}

impl BodyPart {
    pub fn new(mime_type: Option<&str>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.map(str::to_string),
            data: data.into(),
        }
    }
}

/// A message fetched from the mailbox, owned by the processor while it is handled
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: MessageId,
    pub headers: Vec<Header>,
    pub parts: Vec<BodyPart>,
}

impl RawMessage {
    /// Case-insensitive header lookup, first occurrence wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Metadata carried into log entries and summary records
    pub fn meta(&self) -> MessageMeta {
        MessageMeta {
            id: self.id.clone(),
            subject: self.header("Subject").unwrap_or("No Subject").to_string(),
            from: self.header("From").unwrap_or("Unknown Sender").to_string(),
            received_at: self.header("Date").unwrap_or("Unknown Time").to_string(),
        }
    }
}

/// Header values the pipeline reports about a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    pub id: MessageId,
    pub subject: String,
    pub from: String,
    /// Raw `Date` header; kept as text because senders format it freely
    pub received_at: String,
}
