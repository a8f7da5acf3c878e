//! Unsub crate - mailbox unsubscribe automation
//!
//! This crate provides the pipeline behind the `unsub` binary:
//! - Domain models (messages, log entries, run configuration)
//! - Gmail API client, OAuth authentication and the mailbox provider seam
//! - Unsubscribe link extraction from HTML bodies
//! - A persistent, mergeable automation log
//! - A browser-driven actor that clicks unsubscribe controls
//! - The mailbox walker, message processor and pipeline controller
//!
//! The crate has no UI dependencies; progress is reported through
//! [`ProgressSink`].

pub mod actions;
pub mod actor;
pub mod config;
pub mod extract;
pub mod gmail;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod progress;
pub mod storage;
pub mod sync;

pub use actions::{InvoiceScan, PartAction, UnsubscribeAction};
pub use actor::{
    BrowserDriver, BrowserError, BrowserPage, BrowserSession, ChromiumDriver, LaunchOptions,
    PageElement, UNSUBSCRIBE_SELECTORS, UnsubscribeActor,
};
pub use config::GmailCredentials;
pub use extract::{LinkExtractor, LinkPolicy, extract_invoice_links, extract_unsubscribe_links};
pub use gmail::{GmailAuth, GmailClient, GmailMailbox, MailboxProvider, MessagePage};
pub use models::{
    AttemptStatus, BodyPart, BrowserTiming, ConfigError, Header, LinkAttempt, LogEntry, MessageId,
    MessageMeta, ProcessingBudget, RawMessage, RunConfig, RunMode, RunSettings,
};
pub use pipeline::{Pipeline, RunReport};
pub use processor::{MessageProcessor, decode_body};
pub use progress::{
    JsonLinesSink, LogSink, MemorySink, MessageSummary, ProgressEvent, ProgressSink, SummaryStatus,
};
pub use storage::{AutomationLog, InMemoryLog, JsonFileLog, LogLock, LogSummary};
pub use sync::{MailboxCursor, MailboxWalker, MessageHandler, WalkEnd, WalkStats};
