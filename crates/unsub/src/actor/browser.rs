//! Browser automation seam
//!
//! The actor only needs a handful of operations: launch a session, open a
//! page, look up an element by CSS selector, click it, close things again.
//! [`super::ChromiumDriver`] implements them over the Chrome DevTools
//! Protocol; tests supply scripted fakes.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Failed to navigate to {url}: {details}")]
    Navigate { url: String, details: String },
    #[error("Navigation to {url} timed out after {} ms", .timeout.as_millis())]
    Timeout { url: String, timeout: Duration },
    #[error("Selector query '{selector}' failed: {details}")]
    Query { selector: String, details: String },
    #[error("Click failed: {0}")]
    Click(String),
    #[error("Failed to close browser: {0}")]
    Close(String),
    #[error("Driver internal error: {0}")]
    Internal(String),
}

/// How a session is started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Pause before each interaction; zero when headless
    pub slow_mo: Duration,
}

impl LaunchOptions {
    pub fn new(headless: bool, slow_mo: Duration) -> Self {
        Self {
            headless,
            slow_mo: if headless { Duration::ZERO } else { slow_mo },
        }
    }
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self, options: LaunchOptions) -> Result<Self::Session, BrowserError>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Page: BrowserPage;

    /// Open `url` in a new tab and wait for it to load, bounded by `timeout`
    async fn open(&self, url: &str, timeout: Duration) -> Result<Self::Page, BrowserError>;

    /// Shut the browser down
    async fn close(self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    type Element: PageElement;

    /// First element matching `selector`, if any
    async fn query_selector(&self, selector: &str) -> Result<Option<Self::Element>, BrowserError>;

    async fn close(self) -> Result<(), BrowserError>;
}

#[async_trait]
pub trait PageElement: Send + Sync {
    async fn click(&self) -> Result<(), BrowserError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_disables_slow_mo() {
        let opts = LaunchOptions::new(true, Duration::from_millis(100));
        assert_eq!(opts.slow_mo, Duration::ZERO);

        let opts = LaunchOptions::new(false, Duration::from_millis(100));
        assert_eq!(opts.slow_mo, Duration::from_millis(100));
    }

    #[test]
    fn test_timeout_message() {
        let err = BrowserError::Timeout {
            url: "https://x.test".into(),
            timeout: Duration::from_secs(60),
        };
        assert_eq!(
            err.to_string(),
            "Navigation to https://x.test timed out after 60000 ms"
        );
    }
}
