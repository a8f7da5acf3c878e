//! Shared fakes for pipeline integration tests

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use unsub::{
    BodyPart, BrowserDriver, BrowserError, BrowserPage, BrowserSession, Header, LaunchOptions,
    MailboxProvider, MessageId, MessagePage, PageElement, RawMessage,
};

/// Mailbox backed by a vector; page tokens are offsets
#[derive(Default)]
pub struct TestMailbox {
    messages: Vec<RawMessage>,
    pub fetches: AtomicUsize,
}

impl TestMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, id: &str, subject: &str, html: &str) -> Self {
        self.messages.push(RawMessage {
            id: MessageId::new(id),
            headers: vec![
                Header {
                    name: "Subject".into(),
                    value: subject.into(),
                },
                Header {
                    name: "From".into(),
                    value: "Shop <news@shop.test>".into(),
                },
                Header {
                    name: "Date".into(),
                    value: "Mon, 1 Jan 2024 10:00:00 +0000".into(),
                },
            ],
            parts: vec![BodyPart::new(Some("text/html"), URL_SAFE_NO_PAD.encode(html))],
        });
        self
    }
}

#[async_trait]
impl MailboxProvider for TestMailbox {
    async fn list_message_ids(
        &self,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage> {
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

/// Browser whose pages expose a fixed set of selectors per URL
#[derive(Clone, Default)]
pub struct TestBrowser {
    pages: Arc<HashMap<String, Vec<&'static str>>>,
    unreachable: Arc<Vec<String>>,
    pub launches: Arc<AtomicUsize>,
    pub clicks: Arc<Mutex<Vec<(String, String)>>>,
}

impl TestBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, selectors: &[&'static str]) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), selectors.to_vec());
        self
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        Arc::make_mut(&mut self.unreachable).push(url.to_string());
        self
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn click_count(&self) -> usize {
        self.clicks.lock().unwrap().len()
    }
}

pub struct TestSession(TestBrowser);

pub struct TestPage {
    url: String,
    selectors: Vec<&'static str>,
    clicks: Arc<Mutex<Vec<(String, String)>>>,
}

pub struct TestElement {
    url: String,
    selector: String,
    clicks: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl BrowserDriver for TestBrowser {
    type Session = TestSession;

    async fn launch(&self, _options: LaunchOptions) -> Result<TestSession, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(TestSession(self.clone()))
    }
}

#[async_trait]
impl BrowserSession for TestSession {
    type Page = TestPage;

    async fn open(&self, url: &str, timeout: Duration) -> Result<TestPage, BrowserError> {
        if self.0.unreachable.iter().any(|u| u == url) {
            return Err(BrowserError::Timeout {
                url: url.to_string(),
                timeout,
            });
        }
        Ok(TestPage {
            url: url.to_string(),
            selectors: self.0.pages.get(url).cloned().unwrap_or_default(),
            clicks: self.0.clicks.clone(),
        })
    }

    async fn close(self) -> Result<(), BrowserError> {
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for TestPage {
    type Element = TestElement;

    async fn query_selector(&self, selector: &str) -> Result<Option<TestElement>, BrowserError> {
        Ok(self.selectors.iter().any(|s| *s == selector).then(|| TestElement {
            url: self.url.clone(),
            selector: selector.to_string(),
            clicks: self.clicks.clone(),
        }))
    }

    async fn close(self) -> Result<(), BrowserError> {
        Ok(())
    }
}

#[async_trait]
impl PageElement for TestElement {
    async fn click(&self) -> Result<(), BrowserError> {
        self.clicks
            .lock()
            .unwrap()
            .push((self.url.clone(), self.selector.clone()));
        Ok(())
    }
}
