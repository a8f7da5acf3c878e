//! Unsubscribe action: extract candidates, drive the actor, record outcomes

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use super::PartAction;
use crate::actor::{BrowserDriver, UnsubscribeActor};
use crate::extract::LinkExtractor;
use crate::models::{LogEntry, MessageId, MessageMeta};
use crate::progress::ProgressSink;
use crate::storage::AutomationLog;

pub struct UnsubscribeAction<D: BrowserDriver> {
    extractor: LinkExtractor,
    actor: UnsubscribeActor<D>,
    log: Arc<dyn AutomationLog>,
    sink: Arc<dyn ProgressSink>,
}

impl<D: BrowserDriver> UnsubscribeAction<D> {
    pub fn new(
        extractor: LinkExtractor,
        actor: UnsubscribeActor<D>,
        log: Arc<dyn AutomationLog>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            extractor,
            actor,
            log,
            sink,
        }
    }
}

#[async_trait]
impl<D: BrowserDriver> PartAction for UnsubscribeAction<D> {
    fn already_handled(&self, id: &MessageId) -> Result<bool> {
        self.log.is_settled(id)
    }

    async fn handle_part(&self, meta: &MessageMeta, text: &str) -> Result<usize> {
        let links: Vec<String> = self.extractor.links(text).collect();
        if links.is_empty() {
            return Ok(0);
        }

        debug!("Message {}: {} candidate links", meta.id, links.len());
        self.sink.line(&format!(
            "Found {} unsubscribe links in \"{}\" from {}",
            links.len(),
            meta.subject,
            meta.from
        ));

        let entries: Vec<LogEntry> = self
            .actor
            .unsubscribe(&links)
            .await
            .into_iter()
            .map(|attempt| LogEntry::from_attempt(meta, attempt))
            .collect();

        self.log
            .merge(&entries)
            .with_context(|| format!("Failed to record attempts for {}", meta.id))?;
        Ok(links.len())
    }
}
