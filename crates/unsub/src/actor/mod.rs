//! Unsubscribe actor
//!
//! Visits candidate links in a browser and clicks whatever looks like an
//! unsubscribe control. One browser session serves one batch of links; links
//! are visited one after another. The actor reports per-link outcomes and
//! never writes the automation log itself.

mod browser;
mod chromium;

pub use browser::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, LaunchOptions, PageElement,
};
pub use chromium::{ChromiumDriver, ChromiumElement, ChromiumPage, ChromiumSession};

use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{BrowserTiming, LinkAttempt};
use crate::progress::ProgressSink;
use crate::storage::AutomationLog;

/// Selectors probed on each page, highest priority first
pub const UNSUBSCRIBE_SELECTORS: [&str; 6] = [
    r#"button[type="submit"]"#,
    r#"input[type="submit"]"#,
    r#"a[href*="unsubscribe"]"#,
    r#"a[href*="abmelden"]"#,
    r#"a[href*="opt-out"]"#,
    r#"a[href*="preferences"]"#,
];

type PageOf<D> = <<D as BrowserDriver>::Session as BrowserSession>::Page;

pub struct UnsubscribeActor<D: BrowserDriver> {
    driver: D,
    log: Arc<dyn AutomationLog>,
    sink: Arc<dyn ProgressSink>,
    launch: LaunchOptions,
    timing: BrowserTiming,
}

impl<D: BrowserDriver> UnsubscribeActor<D> {
    pub fn new(
        driver: D,
        log: Arc<dyn AutomationLog>,
        sink: Arc<dyn ProgressSink>,
        headless: bool,
        timing: BrowserTiming,
    ) -> Self {
        Self {
            driver,
            log,
            sink,
            launch: LaunchOptions::new(headless, timing.slow_mo),
            timing,
        }
    }

    /// Visit every link that has no settled attempt on record.
    ///
    /// Returns one attempt per visited link, in input order. Links already
    /// settled are left out; if none remain no browser is started.
    pub async fn unsubscribe(&self, links: &[String]) -> Vec<LinkAttempt> {
        let settled = self.log.settled_links().unwrap_or_else(|e| {
            warn!("Could not read automation log, visiting all links: {:#}", e);
            self.sink.line(&format!(
                "Could not read the automation log ({:#}). Visiting all links.",
                e
            ));
            HashSet::new()
        });

        let pending: Vec<&str> = links
            .iter()
            .map(String::as_str)
            .filter(|link| !settled.contains(*link))
            .collect();

        if pending.is_empty() {
            self.sink
                .line("No new links to process. All links have been processed.");
            return Vec::new();
        }

        self.sink
            .line(&format!("Found {} new links to process.", pending.len()));

        let session = match self.driver.launch(self.launch).await {
            Ok(session) => session,
            Err(e) => {
                self.sink.line(&format!("Could not start browser: {}", e));
                return pending
                    .into_iter()
                    .map(|link| LinkAttempt::failed(link, &e))
                    .collect();
            }
        };

        let mut attempts = Vec::with_capacity(pending.len());
        for link in pending {
            attempts.push(self.visit(&session, link).await);
        }

        if let Err(e) = session.close().await {
            warn!("{}", e);
        }
        attempts
    }

    async fn visit(&self, session: &D::Session, link: &str) -> LinkAttempt {
        self.sink.line(&format!("Opening link: {}", link));

        let page = match session.open(link, self.timing.navigation_timeout).await {
            Ok(page) => page,
            Err(e) => {
                self.sink
                    .line(&format!("Error processing link {}: {}", link, e));
                return LinkAttempt::failed(link, e);
            }
        };

        let outcome = self.click_first_control(&page).await;
        if let Err(e) = page.close().await {
            debug!("{}", e);
        }

        match outcome {
            Ok(clicked) => {
                if !clicked {
                    self.sink
                        .line(&format!("No unsubscribe control found on {}", link));
                }
                LinkAttempt::succeeded(link, clicked)
            }
            Err(e) => {
                self.sink
                    .line(&format!("Error processing link {}: {}", link, e));
                LinkAttempt::failed(link, e)
            }
        }
    }

    /// Click the first element matching the selector list; `false` if none matched
    async fn click_first_control(&self, page: &PageOf<D>) -> Result<bool, BrowserError> {
        for selector in UNSUBSCRIBE_SELECTORS {
            if let Some(element) = page.query_selector(selector).await? {
                self.sink.line(&format!(
                    "Found and clicking unsubscribe button with selector: {}",
                    selector
                ));
                element.click().await?;
                tokio::time::sleep(self.timing.settle_delay).await;
                return Ok(true);
            }
        }
        Ok(false)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeBrowser, PageScript};
    use super::*;
    use crate::models::{AttemptStatus, LogEntry, MessageId};
    use crate::progress::MemorySink;
    use crate::storage::InMemoryLog;
    use chrono::Utc;
    use std::time::Duration;

    fn timing() -> BrowserTiming {
        BrowserTiming {
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(2),
            slow_mo: Duration::ZERO,
        }
    }

    fn actor(
        browser: &FakeBrowser,
        log: Arc<InMemoryLog>,
    ) -> (UnsubscribeActor<FakeBrowser>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let actor = UnsubscribeActor::new(browser.clone(), log, sink.clone(), true, timing());
        (actor, sink)
    }

    fn links(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_matching_selector_is_no_action_needed() {
        let browser = FakeBrowser::new().page("https://a.test/unsubscribe", PageScript::default());
        let (actor, _) = actor(&browser, Arc::new(InMemoryLog::new()));

        let attempts = actor.unsubscribe(&links(&["https://a.test/unsubscribe"])).await;

        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::NoActionNeeded);
        assert_eq!(attempts[0].error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clicks_highest_priority_selector_once() {
        let browser = FakeBrowser::new().page(
            "https://a.test/unsubscribe",
            PageScript {
                matches: vec![r#"a[href*="unsubscribe"]"#, r#"input[type="submit"]"#],
                ..Default::default()
            },
        );
        let (actor, _) = actor(&browser, Arc::new(InMemoryLog::new()));

        let start = tokio::time::Instant::now();
        let attempts = actor.unsubscribe(&links(&["https://a.test/unsubscribe"])).await;

        assert_eq!(attempts[0].status, AttemptStatus::Unsubscribed);
        let clicked = browser.clicks();
        assert_eq!(clicked.len(), 1);
        assert_eq!(clicked[0].1, r#"input[type="submit"]"#);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_abort_batch() {
        let browser = FakeBrowser::new()
            .page(
                "https://slow.test/unsubscribe",
                PageScript {
                    fail_navigation: true,
                    ..Default::default()
                },
            )
            .page(
                "https://broken.test/unsubscribe",
                PageScript {
                    matches: vec![r#"button[type="submit"]"#],
                    fail_click: true,
                    ..Default::default()
                },
            )
            .page(
                "https://ok.test/unsubscribe",
                PageScript {
                    matches: vec![r#"button[type="submit"]"#],
                    ..Default::default()
                },
            );
        let (actor, _) = actor(&browser, Arc::new(InMemoryLog::new()));

        let attempts = actor
            .unsubscribe(&links(&[
                "https://slow.test/unsubscribe",
                "https://broken.test/unsubscribe",
                "https://ok.test/unsubscribe",
            ]))
            .await;

        let statuses: Vec<_> = attempts.iter().map(|a| a.status).collect();
        assert_eq!(
            statuses,
            vec![
                AttemptStatus::Failed,
                AttemptStatus::Failed,
                AttemptStatus::Unsubscribed
            ]
        );
        assert!(attempts[0].error.as_deref().unwrap().contains("timed out"));
        assert!(attempts[1].error.as_deref().unwrap().contains("Click failed"));
        assert_eq!(browser.launches(), 1);
        assert_eq!(browser.closes(), 1);
    }

    #[tokio::test]
    async fn test_settled_links_skip_browser_launch() {
        let log = Arc::new(InMemoryLog::with_entries(vec![LogEntry {
            message_id: MessageId::new("older"),
            link: "https://a.test/unsubscribe".into(),
            subject: String::new(),
            from: String::new(),
            received_at: String::new(),
            status: AttemptStatus::Unsubscribed,
            timestamp: Utc::now(),
            error: None,
        }]));
        let browser = FakeBrowser::new();
        let (actor, sink) = actor(&browser, log);

        let attempts = actor.unsubscribe(&links(&["https://a.test/unsubscribe"])).await;

        assert!(attempts.is_empty());
        assert_eq!(browser.launches(), 0);
        assert!(sink.lines().iter().any(|l| l.starts_with("No new links")));
    }

    #[tokio::test]
    async fn test_failed_links_are_retried() {
        let log = Arc::new(InMemoryLog::with_entries(vec![LogEntry {
            message_id: MessageId::new("older"),
            link: "https://a.test/unsubscribe".into(),
            subject: String::new(),
            from: String::new(),
            received_at: String::new(),
            status: AttemptStatus::Failed,
            timestamp: Utc::now(),
            error: Some("timeout".into()),
        }]));
        let browser = FakeBrowser::new();
        let (actor, _) = actor(&browser, log);

        let attempts = actor.unsubscribe(&links(&["https://a.test/unsubscribe"])).await;

        assert_eq!(attempts.len(), 1);
        assert_eq!(browser.launches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_log_visits_every_link_and_says_so() {
        // a directory cannot be read as a log file
        let dir = tempfile::TempDir::new().unwrap();
        let log = Arc::new(crate::storage::JsonFileLog::new(dir.path()));
        let sink = Arc::new(MemorySink::new());
        let browser = FakeBrowser::new();
        let actor = UnsubscribeActor::new(browser.clone(), log, sink.clone(), true, timing());

        let attempts = actor.unsubscribe(&links(&["https://a.test/unsubscribe"])).await;

        assert_eq!(attempts.len(), 1);
        assert_eq!(browser.launches(), 1);
        assert!(
            sink.lines()
                .iter()
                .any(|l| l.starts_with("Could not read the automation log"))
        );
    }

    #[tokio::test]
    async fn test_launch_failure_fails_every_pending_link() {
        let browser = FakeBrowser::new().failing_launch();
        let (actor, _) = actor(&browser, Arc::new(InMemoryLog::new()));

        let attempts = actor
            .unsubscribe(&links(&["https://a.test/unsubscribe", "https://b.test/opt-out"]))
            .await;

        assert_eq!(attempts.len(), 2);
        assert!(attempts.iter().all(|a| a.status == AttemptStatus::Failed));
    }
}
