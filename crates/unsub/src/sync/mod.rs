//! Mailbox traversal
//!
//! Lists the mailbox page by page and fans message ids out to a handler
//! under a concurrency cap. Listing failures are retried with the same
//! cursor, so a page is never skipped.

mod walker;

pub use walker::{MailboxCursor, MailboxWalker, MessageHandler, WalkEnd, WalkStats};
