//! Automation log storage
//!
//! The log is the only state that survives between runs. [`JsonFileLog`]
//! keeps it as a human-readable JSON array; [`InMemoryLog`] backs tests.
//!
//! Two runs writing the same log file at once can lose each other's updates
//! because every merge rewrites the whole file. [`LogLock`] gives callers an
//! opt-in way to refuse a second concurrent run.

mod json_file;
mod memory;
mod summary;
mod traits;

pub use json_file::{JsonFileLog, LogLock};
pub use memory::InMemoryLog;
pub use summary::LogSummary;
pub use traits::{AutomationLog, overlay};
