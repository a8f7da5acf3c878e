//! Pipeline controller
//!
//! Wires walker, processor, action, actor and automation log together for
//! one run and reports progress to the hosting shell.

use anyhow::Result;
use log::{error, info};
use std::sync::Arc;

use crate::actions::{InvoiceScan, PartAction, UnsubscribeAction};
use crate::actor::{BrowserDriver, UnsubscribeActor};
use crate::extract::LinkExtractor;
use crate::gmail::MailboxProvider;
use crate::models::{ConfigError, RunConfig, RunMode, RunSettings};
use crate::processor::MessageProcessor;
use crate::progress::ProgressSink;
use crate::storage::{AutomationLog, LogLock};
use crate::sync::{MailboxWalker, WalkEnd, WalkStats};

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub stats: WalkStats,
    pub end: WalkEnd,
}

pub struct Pipeline {
    config: RunConfig,
    sink: Arc<dyn ProgressSink>,
}

impl Pipeline {
    pub fn new(config: RunConfig, sink: Arc<dyn ProgressSink>) -> Self {
        Self { config, sink }
    }

    /// Validate merged settings; an invalid configuration is reported to the sink
    pub fn from_settings(
        settings: RunSettings,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, ConfigError> {
        match settings.into_config() {
            Ok(config) => Ok(Self::new(config, sink)),
            Err(e) => {
                error!("Invalid configuration: {}", e);
                sink.line(&format!("Configuration error: {}", e));
                Err(e)
            }
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Strategy for the configured mode
    pub fn action<D>(&self, driver: D, log: Arc<dyn AutomationLog>) -> Arc<dyn PartAction>
    where
        D: BrowserDriver + 'static,
    {
        match self.config.mode {
            RunMode::Unsubscribe => {
                let actor = UnsubscribeActor::new(
                    driver,
                    log.clone(),
                    self.sink.clone(),
                    self.config.headless,
                    self.config.browser,
                );
                Arc::new(UnsubscribeAction::new(
                    LinkExtractor::new(self.config.link_policy),
                    actor,
                    log,
                    self.sink.clone(),
                ))
            }
            RunMode::DownloadInvoices => Arc::new(InvoiceScan::new(self.sink.clone())),
        }
    }

    /// Run once over the mailbox
    ///
    /// Fails only before any message is touched: when the exclusive log lock
    /// is requested and already held.
    pub async fn run<P, D>(
        &self,
        provider: Arc<P>,
        driver: D,
        log: Arc<dyn AutomationLog>,
    ) -> Result<RunReport>
    where
        P: MailboxProvider,
        D: BrowserDriver + 'static,
    {
        let _lock = if self.config.exclusive_log {
            match LogLock::acquire(&self.config.log_path) {
                Ok(lock) => Some(lock),
                Err(e) => {
                    self.sink.line(&format!("Configuration error: {:#}", e));
                    return Err(e);
                }
            }
        } else {
            None
        };

        self.sink.line(&format!(
            "Checking up to {} emails.",
            self.config.budget.max_messages
        ));
        self.sink.line(if self.config.headless {
            "Process will run in the background."
        } else {
            "Process will run visibly."
        });
        if self.config.mode == RunMode::DownloadInvoices {
            self.sink
                .line("Invoice mode: links are reported, nothing is downloaded.");
        }
        self.sink.line("Starting email processing...");
        info!(
            "Run started: mode {:?}, concurrency {}, log {}",
            self.config.mode,
            self.config.concurrency,
            self.config.log_path.display()
        );

        let processor = MessageProcessor::new(
            provider.clone(),
            self.action(driver, log),
            self.sink.clone(),
        );
        let walker = MailboxWalker::new(provider, &self.config, self.sink.clone());
        let (stats, end) = walker.walk(&processor).await;

        if end == WalkEnd::ListingFailed {
            self.sink
                .line("Stopped early: the mailbox could not be listed.");
        }
        self.sink.line("Finished processing messages.");
        self.sink.line(&format!(
            "Processed {} messages across {} pages ({} errors, {} listing retries) in {:.1}s.",
            stats.messages_dispatched,
            stats.pages,
            stats.errors,
            stats.retries,
            stats.duration_ms as f64 / 1000.0
        ));

        Ok(RunReport { stats, end })
    }
}
