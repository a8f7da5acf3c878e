//! Run configuration
//!
//! Settings arrive in layers (settings file, then CLI/environment) as a
//! [`RunSettings`] with every field optional. [`RunSettings::into_config`]
//! validates the merged layers into an immutable [`RunConfig`] that is handed
//! to the walker and actor at construction and never changes during a run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::extract::LinkPolicy;

/// Log filename in the unsub config directory
pub const LOG_FILE: &str = "unsubscribe_log.json";

/// Settings filename in the unsub config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Errors that stop the pipeline before it starts
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_messages must be greater than zero")]
    ZeroBudget,
    #[error("page_size must be between 1 and {max}, got {got}")]
    PageSize { got: usize, max: usize },
    #[error("concurrency must be greater than zero")]
    ZeroConcurrency,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("could not determine a location for the automation log; pass --log-file")]
    NoLogPath,
    #[error("Gmail credentials unavailable: {0}")]
    Credentials(String),
    #[error("automation log {0} is locked by another run (delete the .lock file if no run is active)")]
    LogLocked(PathBuf),
}

/// What the pipeline does with each message part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    #[default]
    Unsubscribe,
    #[serde(rename = "invoices")]
    DownloadInvoices,
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsubscribe" | "2" => Ok(RunMode::Unsubscribe),
            "invoices" | "download-invoices" | "1" => Ok(RunMode::DownloadInvoices),
            other => Err(format!("unknown mode '{other}' (expected unsubscribe or invoices)")),
        }
    }
}

/// How much of the mailbox one run may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingBudget {
    /// Stop requesting pages once this many messages were dispatched
    pub max_messages: usize,
    /// Message ids requested per listing call
    pub page_size: usize,
}

impl ProcessingBudget {
    /// Gmail refuses larger pages
    pub const MAX_PAGE_SIZE: usize = 500;

    pub fn new(max_messages: usize, page_size: usize) -> Result<Self, ConfigError> {
        if max_messages == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if page_size == 0 || page_size > Self::MAX_PAGE_SIZE {
            return Err(ConfigError::PageSize {
                got: page_size,
                max: Self::MAX_PAGE_SIZE,
            });
        }
        Ok(Self {
            max_messages,
            page_size,
        })
    }

    /// Whether a cursor that has seen `processed` messages must stop
    pub fn exhausted(&self, processed: usize) -> bool {
        processed >= self.max_messages
    }
}

/// Browser pacing used by the unsubscribe actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserTiming {
    /// Upper bound for one page navigation
    pub navigation_timeout: Duration,
    /// Pause after a click so redirects and confirmations can finish
    pub settle_delay: Duration,
    /// Delay before each interaction when the browser is visible
    pub slow_mo: Duration,
}

impl Default for BrowserTiming {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(2),
            slow_mo: Duration::from_millis(100),
        }
    }
}

/// Validated, immutable configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub budget: ProcessingBudget,
    pub headless: bool,
    pub mode: RunMode,
    /// Maximum messages processed at the same time
    pub concurrency: usize,
    pub link_policy: LinkPolicy,
    pub log_path: PathBuf,
    /// Hold a lock file next to the log for the duration of the run
    pub exclusive_log: bool,
    pub browser: BrowserTiming,
    /// Fixed wait between failed listing attempts
    pub list_retry_delay: Duration,
    /// Give up listing after this many consecutive failures (None = never)
    pub max_list_retries: Option<u32>,
}

/// One layer of optional settings (settings file or command line)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RunSettings {
    pub max_messages: Option<usize>,
    pub page_size: Option<usize>,
    pub headless: Option<bool>,
    pub mode: Option<RunMode>,
    pub concurrency: Option<usize>,
    pub link_policy: Option<LinkPolicy>,
    pub log_path: Option<PathBuf>,
    pub exclusive_log: Option<bool>,
    pub navigation_timeout_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub slow_mo_ms: Option<u64>,
    pub list_retry_delay_ms: Option<u64>,
    pub max_list_retries: Option<u32>,
}

impl RunSettings {
    pub const DEFAULT_MAX_MESSAGES: usize = 20;
    pub const DEFAULT_PAGE_SIZE: usize = 20;
    pub const DEFAULT_CONCURRENCY: usize = 5;
    pub const DEFAULT_LIST_RETRY_DELAY: Duration = Duration::from_secs(5);

    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(self, other: RunSettings) -> RunSettings {
        RunSettings {
            max_messages: other.max_messages.or(self.max_messages),
            page_size: other.page_size.or(self.page_size),
            headless: other.headless.or(self.headless),
            mode: other.mode.or(self.mode),
            concurrency: other.concurrency.or(self.concurrency),
            link_policy: other.link_policy.or(self.link_policy),
            log_path: other.log_path.or(self.log_path),
            exclusive_log: other.exclusive_log.or(self.exclusive_log),
            navigation_timeout_ms: other.navigation_timeout_ms.or(self.navigation_timeout_ms),
            settle_delay_ms: other.settle_delay_ms.or(self.settle_delay_ms),
            slow_mo_ms: other.slow_mo_ms.or(self.slow_mo_ms),
            list_retry_delay_ms: other.list_retry_delay_ms.or(self.list_retry_delay_ms),
            max_list_retries: other.max_list_retries.or(self.max_list_retries),
        }
    }

    /// Fill defaults and validate
    pub fn into_config(self) -> Result<RunConfig, ConfigError> {
        let budget = ProcessingBudget::new(
            self.max_messages.unwrap_or(Self::DEFAULT_MAX_MESSAGES),
            self.page_size.unwrap_or(Self::DEFAULT_PAGE_SIZE),
        )?;

        let concurrency = self.concurrency.unwrap_or(Self::DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        let defaults = BrowserTiming::default();
        let browser = BrowserTiming {
            navigation_timeout: positive_ms(
                self.navigation_timeout_ms,
                defaults.navigation_timeout,
                "navigation_timeout_ms",
            )?,
            settle_delay: self
                .settle_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.settle_delay),
            slow_mo: self
                .slow_mo_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.slow_mo),
        };

        let list_retry_delay = positive_ms(
            self.list_retry_delay_ms,
            Self::DEFAULT_LIST_RETRY_DELAY,
            "list_retry_delay_ms",
        )?;

        let log_path = self
            .log_path
            .or_else(|| config::config_path(LOG_FILE))
            .ok_or(ConfigError::NoLogPath)?;

        Ok(RunConfig {
            budget,
            headless: self.headless.unwrap_or(false),
            mode: self.mode.unwrap_or_default(),
            concurrency,
            link_policy: self.link_policy.unwrap_or_default(),
            log_path,
            exclusive_log: self.exclusive_log.unwrap_or(false),
            browser,
            list_retry_delay,
            max_list_retries: self.max_list_retries,
        })
    }
}

fn positive_ms(
    value: Option<u64>,
    default: Duration,
    name: &'static str,
) -> Result<Duration, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::ZeroDuration(name)),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => Ok(default),
    }
}
