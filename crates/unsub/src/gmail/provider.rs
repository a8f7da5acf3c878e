//! Mailbox provider seam and its Gmail implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use super::{GmailClient, normalize_message};
use crate::models::{MessageId, RawMessage};

/// One page of message ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub ids: Vec<MessageId>,
    /// Absent on the last page
    pub next_page_token: Option<String>,
}

/// Authenticated access to a mailbox
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    async fn list_message_ids(
        &self,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage>;

    async fn get_message(&self, id: &MessageId) -> Result<RawMessage>;
}

/// [`MailboxProvider`] over the blocking Gmail client
///
/// Each call runs on tokio's blocking pool.
#[derive(Clone)]
pub struct GmailMailbox {
    client: Arc<GmailClient>,
}

impl GmailMailbox {
    pub fn new(client: GmailClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &GmailClient {
        &self.client
    }
}

#[async_trait]
impl MailboxProvider for GmailMailbox {
    async fn list_message_ids(
        &self,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage> {
        let client = self.client.clone();
        let token = page_token.map(str::to_string);

        let response = tokio::task::spawn_blocking(move || {
            client.list_messages(page_size, token.as_deref())
        })
        .await
        .context("Gmail list task panicked")??;

        Ok(MessagePage {
            ids: response
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(|m| MessageId::new(m.id))
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn get_message(&self, id: &MessageId) -> Result<RawMessage> {
        let client = self.client.clone();
        let id = id.clone();

        let message = tokio::task::spawn_blocking(move || client.get_message(&id))
            .await
            .context("Gmail fetch task panicked")??;

        Ok(normalize_message(message))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory mailbox used by unit tests

    use super::*;
    use crate::models::{BodyPart, Header};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Pages over its messages in insertion order; page tokens are offsets
    #[derive(Default)]
    pub struct FakeMailbox {
        messages: Vec<RawMessage>,
        fetches: AtomicUsize,
        lists: AtomicUsize,
    }

    impl FakeMailbox {
        pub fn new() -> Self {
            Self::default()
        }

        /// Add a message with one HTML part
        pub fn with(self, id: &str, html: &str) -> Self {
            self.with_encoded(id, &URL_SAFE_NO_PAD.encode(html))
        }

        /// Add a message whose single part carries `data` as-is
        pub fn with_encoded(mut self, id: &str, data: &str) -> Self {
            self.messages.push(RawMessage {
                id: MessageId::new(id),
                headers: vec![
                    Header {
                        name: "Subject".into(),
                        value: format!("Subject {id}"),
                    },
                    Header {
                        name: "From".into(),
                        value: "news@shop.test".into(),
                    },
                ],
                parts: vec![BodyPart::new(Some("text/html"), data)],
            });
            self
        }

        pub fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }

        pub fn lists(&self) -> usize {
            self.lists.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MailboxProvider for FakeMailbox {
        async fn list_message_ids(
            &self,
            page_token: Option<&str>,
            page_size: usize,
        ) -> Result<MessagePage> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            let start = page_token.map(str::parse::<usize>).transpose()?.unwrap_or(0);
            let end = (start + page_size).min(self.messages.len());
            Ok(MessagePage {
                ids: self.messages[start.min(end)..end]
                    .iter()
                    .map(|m| m.id.clone())
                    .collect(),
                next_page_token: (end < self.messages.len()).then(|| end.to_string()),
            })
        }

        async fn get_message(&self, id: &MessageId) -> Result<RawMessage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.messages
                .iter()
                .find(|m| &m.id == id)
                .cloned()
                .with_context(|| format!("no message {id}"))
        }
    }
}
