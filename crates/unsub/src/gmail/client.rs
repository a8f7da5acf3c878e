//! Gmail API HTTP client
//!
//! Lists and fetches messages from the Gmail API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use log::debug;

use super::GmailAuth;
use super::api::{GmailMessage, ListMessagesResponse};
use crate::models::MessageId;

/// Gmail API client for fetching messages
pub struct GmailClient {
    auth: GmailAuth,
}

impl GmailClient {
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Largest page the list endpoint accepts
    pub const MAX_PAGE_SIZE: usize = 500;

    pub fn new(auth: GmailAuth) -> Self {
        Self { auth }
    }

    /// List one page of message IDs from the user's mailbox
    ///
    /// # Arguments
    /// * `max_results` - Maximum number of messages to return (clamped to 1-500)
    /// * `page_token` - Token from the previous page, `None` for the first
    pub fn list_messages(
        &self,
        max_results: usize,
        page_token: Option<&str>,
    ) -> Result<ListMessagesResponse> {
        let access_token = self.auth.get_access_token()?;
        let max_results = max_results.clamp(1, Self::MAX_PAGE_SIZE).to_string();

        let url = format!("{}/users/me/messages", Self::BASE_URL);
        let mut request = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .query("maxResults", &max_results);
        if let Some(token) = page_token {
            request = request.query("pageToken", token);
        }

        let mut response = request
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        debug!(
            "Listed {} message ids (next page: {})",
            list.messages.as_ref().map_or(0, Vec::len),
            list.next_page_token.is_some()
        );
        Ok(list)
    }

    /// Get full message details by ID
    pub fn get_message(&self, id: &MessageId) -> Result<GmailMessage> {
        let access_token = self.auth.get_access_token()?;

        let url = format!(
            "{}/users/me/messages/{}",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        let mut response = ureq::get(&url)
            .header("Authorization", &format!("Bearer {}", access_token))
            .query("format", "full")
            .call()
            .with_context(|| format!("Failed to send get message request for {}", id))?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse message {}", id))?;

        Ok(message)
    }

    /// Trigger authentication flow
    pub fn authenticate(&self) -> Result<()> {
        self.auth.get_access_token()?;
        Ok(())
    }
}
