//! Message processor
//!
//! Handles one message id end to end: idempotence gate, fetch, body
//! decoding, the per-part action and the summary record for the UI.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use log::{debug, warn};
use std::sync::Arc;

use crate::actions::PartAction;
use crate::gmail::MailboxProvider;
use crate::models::MessageId;
use crate::progress::{MessageSummary, ProgressSink};
use crate::sync::MessageHandler;

pub struct MessageProcessor<P: MailboxProvider> {
    provider: Arc<P>,
    action: Arc<dyn PartAction>,
    sink: Arc<dyn ProgressSink>,
}

impl<P: MailboxProvider> MessageProcessor<P> {
    pub fn new(provider: Arc<P>, action: Arc<dyn PartAction>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            provider,
            action,
            sink,
        }
    }

    /// Process one message and emit its summary record
    pub async fn process(&self, id: &MessageId) -> Result<MessageSummary> {
        if self.action.already_handled(id)? {
            self.sink
                .line(&format!("Skipping already processed message {}", id));
            let summary = MessageSummary::skipped(id);
            self.sink.record(&summary);
            return Ok(summary);
        }

        let message = self
            .provider
            .get_message(id)
            .await
            .with_context(|| format!("Failed to fetch message {}", id))?;
        let meta = message.meta();

        let mut links_found = 0;
        for (index, part) in message.parts.iter().enumerate() {
            let Some(text) = decode_body(&part.data) else {
                warn!("Message {}: part {} is not valid base64, skipped", id, index);
                self.sink.line(&format!(
                    "Skipping undecodable part {} of message {}",
                    index, id
                ));
                continue;
            };
            links_found += self.action.handle_part(&meta, &text).await?;
        }

        debug!("Message {}: {} parts, {} links", id, message.parts.len(), links_found);
        let summary = MessageSummary::new(&meta, links_found);
        self.sink.record(&summary);
        Ok(summary)
    }
}

#[async_trait]
impl<P: MailboxProvider> MessageHandler for MessageProcessor<P> {
    async fn handle(&self, id: &MessageId) -> Result<()> {
        self.process(id).await.map(|_| ())
    }
}

/// Decode a base64 body and map each octet to the code point of equal value
///
/// Accepts the URL-safe and standard alphabets, padded or not. The octet
/// mapping is Latin-1; multi-byte UTF-8 sequences come out as several
/// characters, which is harmless for ASCII URLs.
pub fn decode_body(data: &str) -> Option<String> {
    let data = data.trim();
    let bytes = [URL_SAFE_NO_PAD, URL_SAFE, STANDARD, STANDARD_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(data).ok())?;
    Some(bytes.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{InvoiceScan, UnsubscribeAction};
    use crate::actor::UnsubscribeActor;
    use crate::actor::testing::{FakeBrowser, PageScript};
    use crate::extract::LinkExtractor;
    use crate::gmail::testing::FakeMailbox;
    use crate::models::{AttemptStatus, BrowserTiming};
    use crate::progress::{MemorySink, SummaryStatus};
    use crate::storage::{AutomationLog, InMemoryLog};
    use std::time::Duration;

    struct Fixture {
        browser: FakeBrowser,
        log: Arc<InMemoryLog>,
        sink: Arc<MemorySink>,
        mailbox: Arc<FakeMailbox>,
        processor: MessageProcessor<FakeMailbox>,
    }

    fn fixture(mailbox: FakeMailbox, browser: FakeBrowser) -> Fixture {
        let log = Arc::new(InMemoryLog::new());
        let sink = Arc::new(MemorySink::new());
        let mailbox = Arc::new(mailbox);
        let timing = BrowserTiming {
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::ZERO,
            slow_mo: Duration::ZERO,
        };
        let actor = UnsubscribeActor::new(browser.clone(), log.clone(), sink.clone(), true, timing);
        let action = Arc::new(UnsubscribeAction::new(
            LinkExtractor::default(),
            actor,
            log.clone(),
            sink.clone(),
        ));
        let processor = MessageProcessor::new(mailbox.clone(), action, sink.clone());
        Fixture {
            browser,
            log,
            sink,
            mailbox,
            processor,
        }
    }

    #[test]
    fn test_decode_body_alphabets() {
        assert_eq!(decode_body("aGk_Pz8").as_deref(), Some("hi???"));
        assert_eq!(decode_body("aGk/Pz8=").as_deref(), Some("hi???"));
        assert_eq!(decode_body("aGk").as_deref(), Some("hi"));
        assert_eq!(decode_body("not base64!"), None);
    }

    #[test]
    fn test_decode_body_is_latin1() {
        // "é" in UTF-8 is C3 A9
        let encoded = STANDARD.encode("é".as_bytes());
        assert_eq!(decode_body(&encoded).as_deref(), Some("\u{c3}\u{a9}"));
    }

    #[tokio::test]
    async fn test_newsletter_is_unsubscribed_and_reported() {
        let html = r#"<a href="https://shop.test/unsubscribe">Unsubscribe</a>"#;
        let f = fixture(
            FakeMailbox::new().with("m1", html),
            FakeBrowser::new().page(
                "https://shop.test/unsubscribe",
                PageScript {
                    matches: vec![r#"a[href*="unsubscribe"]"#],
                    ..Default::default()
                },
            ),
        );

        let summary = f.processor.process(&MessageId::new("m1")).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Done);
        assert!(summary.is_newsletter);
        assert_eq!(summary.subject, "Subject m1");
        assert_eq!(
            f.log.status_of(&MessageId::new("m1")).unwrap(),
            Some(AttemptStatus::Unsubscribed)
        );
        assert_eq!(f.sink.records(), vec![summary]);
    }

    #[tokio::test]
    async fn test_message_without_links_reports_nothing() {
        let f = fixture(
            FakeMailbox::new().with("m1", "<p>Your receipt</p>"),
            FakeBrowser::new(),
        );

        let summary = f.processor.process(&MessageId::new("m1")).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Nothing);
        assert!(!summary.is_newsletter);
        assert_eq!(f.browser.launches(), 0);
        assert!(f.log.entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settled_message_is_not_fetched() {
        let html = r#"<a href="https://shop.test/unsubscribe">Unsubscribe</a>"#;
        let f = fixture(FakeMailbox::new().with("m1", html), FakeBrowser::new());

        f.processor.process(&MessageId::new("m1")).await.unwrap();
        assert_eq!(f.mailbox.fetches(), 1);

        let again = f.processor.process(&MessageId::new("m1")).await.unwrap();
        assert_eq!(again.status, SummaryStatus::Skipped);
        assert_eq!(f.mailbox.fetches(), 1);
        assert_eq!(f.browser.launches(), 1);
    }

    #[tokio::test]
    async fn test_failed_message_is_retried() {
        let html = r#"<a href="https://shop.test/unsubscribe">Unsubscribe</a>"#;
        let f = fixture(
            FakeMailbox::new().with("m1", html),
            FakeBrowser::new().page(
                "https://shop.test/unsubscribe",
                PageScript {
                    fail_navigation: true,
                    ..Default::default()
                },
            ),
        );

        f.processor.process(&MessageId::new("m1")).await.unwrap();
        assert_eq!(
            f.log.status_of(&MessageId::new("m1")).unwrap(),
            Some(AttemptStatus::Failed)
        );

        f.processor.process(&MessageId::new("m1")).await.unwrap();
        assert_eq!(f.mailbox.fetches(), 2);
        assert_eq!(f.browser.launches(), 2);
    }

    #[tokio::test]
    async fn test_undecodable_part_is_reported() {
        let f = fixture(
            FakeMailbox::new().with_encoded("m1", "%%% not base64 %%%"),
            FakeBrowser::new(),
        );

        let summary = f.processor.process(&MessageId::new("m1")).await.unwrap();

        assert_eq!(summary.status, SummaryStatus::Nothing);
        assert_eq!(
            f.sink.lines(),
            vec!["Skipping undecodable part 0 of message m1".to_string()]
        );
        assert_eq!(f.browser.launches(), 0);
    }

    #[tokio::test]
    async fn test_missing_message_is_an_error() {
        let f = fixture(FakeMailbox::new(), FakeBrowser::new());
        let err = f.processor.process(&MessageId::new("gone")).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to fetch message gone"));
        assert!(f.sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_invoice_mode_never_opens_browser() {
        let html = r#"<a href="https://shop.test/invoice.pdf">Invoice</a>
                      <a href="https://shop.test/unsubscribe">Unsubscribe</a>"#;
        let mailbox = Arc::new(FakeMailbox::new().with("m1", html));
        let sink = Arc::new(MemorySink::new());
        let processor = MessageProcessor::new(
            mailbox,
            Arc::new(InvoiceScan::new(sink.clone())),
            sink.clone(),
        );

        let summary = processor.process(&MessageId::new("m1")).await.unwrap();
        assert_eq!(summary.status, SummaryStatus::Done);
        assert!(sink.lines()[0].ends_with("https://shop.test/invoice.pdf"));
    }
}
