//! Chromium driver over the DevTools protocol

use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::browser::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, LaunchOptions, PageElement,
};

/// Launches a local Chrome/Chromium for each actor batch
#[derive(Debug, Clone)]
pub struct ChromiumDriver {
    executable: Option<PathBuf>,
    sandbox: bool,
}

impl Default for ChromiumDriver {
    fn default() -> Self {
        Self {
            executable: None,
            sandbox: true,
        }
    }
}

impl ChromiumDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific browser binary instead of searching for one
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Pass `--no-sandbox`; needed in most containers and CI runners
    pub fn without_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Explicit binary first, then the well-known install locations
    fn resolve_binary(&self) -> Option<PathBuf> {
        self.executable.clone().or_else(Self::find_chrome_binary)
    }

    fn find_chrome_binary() -> Option<PathBuf> {
        [
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        ]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    type Session = ChromiumSession;

    async fn launch(&self, options: LaunchOptions) -> Result<ChromiumSession, BrowserError> {
        let mut builder = BrowserConfig::builder().viewport(None);

        // Without a resolved binary chromiumoxide falls back to its own lookup
        if let Some(bin) = self.resolve_binary() {
            debug!(target: "browser", "Using browser binary {:?}", bin);
            builder = builder.chrome_executable(bin);
        }
        if !options.headless {
            builder = builder.with_head().arg("--start-maximized");
        }
        if !self.sandbox {
            builder = builder.no_sandbox();
        }

        let config = builder.build().map_err(BrowserError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!(target: "browser", "Chromium event loop exited.");
        });

        info!(
            target: "browser",
            "Browser launched ({})",
            if options.headless { "headless" } else { "visible" }
        );

        Ok(ChromiumSession {
            browser,
            handler,
            slow_mo: options.slow_mo,
        })
    }
}

/// A running browser process
///
/// Dropping the session without calling `close` still kills the child
/// process, but skips the graceful shutdown.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    slow_mo: Duration,
}

async fn pace(slow_mo: Duration) {
    if !slow_mo.is_zero() {
        tokio::time::sleep(slow_mo).await;
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    type Page = ChromiumPage;

    async fn open(&self, url: &str, timeout: Duration) -> Result<ChromiumPage, BrowserError> {
        pace(self.slow_mo).await;

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Internal(format!("Failed to create page: {}", e)))?;

        let navigation = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), CdpError>(())
        };

        let outcome = tokio::time::timeout(timeout, navigation).await;
        let err = match outcome {
            Ok(Ok(())) => {
                return Ok(ChromiumPage {
                    page,
                    slow_mo: self.slow_mo,
                });
            }
            Ok(Err(e)) => BrowserError::Navigate {
                url: url.to_string(),
                details: e.to_string(),
            },
            Err(_) => BrowserError::Timeout {
                url: url.to_string(),
                timeout,
            },
        };

        if let Err(e) = page.close().await {
            debug!(target: "browser", "Failed to close page after error: {}", e);
        }
        Err(err)
    }

    async fn close(mut self) -> Result<(), BrowserError> {
        let result = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            warn!(target: "browser", "Browser process did not exit cleanly: {}", e);
        }
        self.handler.abort();
        result.map(|_| ()).map_err(|e| BrowserError::Close(e.to_string()))
    }
}

/// One open tab
pub struct ChromiumPage {
    page: Page,
    slow_mo: Duration,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    type Element = ChromiumElement;

    async fn query_selector(&self, selector: &str) -> Result<Option<ChromiumElement>, BrowserError> {
        pace(self.slow_mo).await;
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| BrowserError::Query {
                selector: selector.to_string(),
                details: e.to_string(),
            })?;
        Ok(elements.into_iter().next().map(|element| ChromiumElement {
            element,
            slow_mo: self.slow_mo,
        }))
    }

    async fn close(self) -> Result<(), BrowserError> {
        self.page
            .close()
            .await
            .map_err(|e| BrowserError::Internal(format!("Failed to close page: {}", e)))
    }
}

pub struct ChromiumElement {
    element: Element,
    slow_mo: Duration,
}

#[async_trait]
impl PageElement for ChromiumElement {
    async fn click(&self) -> Result<(), BrowserError> {
        pace(self.slow_mo).await;
        self.element
            .click()
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Click(e.to_string()))
    }
}
