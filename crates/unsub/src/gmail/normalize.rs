//! Gmail API response normalization
//!
//! Converts Gmail API messages into [`RawMessage`]. Body data stays base64
//! encoded; decoding belongs to the processor.

use super::api::{self, GmailMessage, MessagePart};
use crate::models::{BodyPart, Header, MessageId, RawMessage};

/// Normalize a Gmail API message
///
/// Nested multiparts are flattened depth-first; only parts with inline data
/// are kept. A payload without parts contributes its own body, if any.
pub fn normalize_message(gmail_msg: GmailMessage) -> RawMessage {
    let id = MessageId::new(gmail_msg.id);

    let Some(payload) = gmail_msg.payload else {
        return RawMessage {
            id,
            headers: Vec::new(),
            parts: Vec::new(),
        };
    };

    let headers = payload
        .headers
        .unwrap_or_default()
        .into_iter()
        .map(convert_header)
        .collect();

    let mut parts = Vec::new();
    match payload.parts {
        Some(children) if !children.is_empty() => collect_parts(&children, &mut parts),
        _ => {
            if let Some(data) = payload.body.and_then(|b| b.data).filter(|d| !d.is_empty()) {
                parts.push(BodyPart::new(payload.mime_type.as_deref(), data));
            }
        }
    }

    RawMessage { id, headers, parts }
}

fn convert_header(h: api::Header) -> Header {
    Header {
        name: h.name,
        value: h.value,
    }
}

fn collect_parts(parts: &[MessagePart], out: &mut Vec<BodyPart>) {
    for part in parts {
        if let Some(data) = part
            .body
            .as_ref()
            .and_then(|b| b.data.as_deref())
            .filter(|d| !d.is_empty())
        {
            out.push(BodyPart::new(part.mime_type.as_deref(), data));
        }
        if let Some(children) = &part.parts {
            collect_parts(children, out);
        }
    }
}
