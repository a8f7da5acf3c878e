//! Invoice scan
//!
//! Reports links that look like invoice downloads. Nothing is fetched or
//! written to the automation log.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::PartAction;
use crate::extract::extract_invoice_links;
use crate::models::{MessageId, MessageMeta};
use crate::progress::ProgressSink;

pub struct InvoiceScan {
    sink: Arc<dyn ProgressSink>,
}

impl InvoiceScan {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl PartAction for InvoiceScan {
    fn already_handled(&self, _id: &MessageId) -> Result<bool> {
        Ok(false)
    }

    async fn handle_part(&self, meta: &MessageMeta, text: &str) -> Result<usize> {
        let links = extract_invoice_links(text);
        for link in &links {
            self.sink
                .line(&format!("Invoice link in {} ({}): {}", meta.id, meta.subject, link));
        }
        Ok(links.len())
    }
}
