//! Per-part actions
//!
//! The run mode is resolved once, when the pipeline is built, into one
//! [`PartAction`]. The processor hands every decoded body part to it and
//! never looks at the mode again.

mod invoices;
mod unsubscribe;

pub use invoices::InvoiceScan;
pub use unsubscribe::UnsubscribeAction;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MessageId, MessageMeta};

/// What to do with the decoded body parts of a message
#[async_trait]
pub trait PartAction: Send + Sync {
    /// Whether earlier runs already settled this message
    ///
    /// A `true` answer skips fetching the message entirely.
    fn already_handled(&self, id: &MessageId) -> Result<bool>;

    /// Handle one decoded body part, returning how many candidate links it had
    async fn handle_part(&self, meta: &MessageMeta, text: &str) -> Result<usize>;
}
