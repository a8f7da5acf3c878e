//! Gmail API integration
//!
//! This module provides:
//! - OAuth2 authentication flow
//! - Gmail API client for listing and fetching messages
//! - Response normalization to [`crate::models::RawMessage`]
//! - [`GmailMailbox`], the [`MailboxProvider`] the pipeline walks

mod auth;
mod client;
mod normalize;
mod provider;

pub use auth::{GmailAuth, remove_token_file};
pub use client::GmailClient;
pub use normalize::normalize_message;
pub use provider::{GmailMailbox, MailboxProvider, MessagePage};

#[cfg(test)]
pub(crate) use provider::testing;

/// Gmail API response types
///
/// Only the fields the pipeline reads are declared; serde skips the rest.
pub mod api {
    use serde::Deserialize;

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct MessageRef {
        pub id: String,
    }

    /// Full message from Gmail API
    #[derive(Debug, Deserialize)]
    pub struct GmailMessage {
        pub id: String,
        pub payload: Option<MessagePayload>,
    }

    /// Message payload containing headers and body
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePayload {
        pub headers: Option<Vec<Header>>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
        pub mime_type: Option<String>,
    }

    /// Email header (name-value pair)
    #[derive(Debug, Deserialize)]
    pub struct Header {
        pub name: String,
        pub value: String,
    }

    /// Message body; `data` is base64url when the content is inline
    #[derive(Debug, Deserialize)]
    pub struct MessageBody {
        pub data: Option<String>,
    }

    /// Message part (for multipart messages)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagePart {
        pub mime_type: Option<String>,
        pub body: Option<MessageBody>,
        pub parts: Option<Vec<MessagePart>>,
    }
}
