//! Domain models for the unsubscribe pipeline

mod log_entry;
mod message;
mod run_config;

pub use log_entry::{AttemptStatus, LinkAttempt, LogEntry};
pub use message::{BodyPart, Header, MessageId, MessageMeta, RawMessage};
pub use run_config::{
    BrowserTiming, ConfigError, LOG_FILE, ProcessingBudget, RunConfig, RunMode, RunSettings,
    SETTINGS_FILE,
};
