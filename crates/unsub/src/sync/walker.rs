//! Mailbox walker
//!
//! Pages through the mailbox and dispatches every listed id to a
//! [`MessageHandler`], at most `concurrency` at a time. A page is always
//! dispatched in full before the next one is requested, so the budget may
//! be overshot by up to one page.

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::gmail::{MailboxProvider, MessagePage};
use crate::models::{MessageId, ProcessingBudget, RunConfig};
use crate::progress::ProgressSink;

/// Work done for each listed message id
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, id: &MessageId) -> Result<()>;
}

/// Statistics from one walk
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WalkStats {
    /// Pages successfully listed
    pub pages: usize,
    pub messages_dispatched: usize,
    /// Messages whose handler returned an error
    pub errors: usize,
    /// Listing attempts that failed and were retried
    pub retries: usize,
    pub duration_ms: u64,
}

/// Position in the mailbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxCursor {
    pub page_token: Option<String>,
    /// Messages dispatched so far
    pub processed: usize,
}

/// Why a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    BudgetReached,
    LastPage,
    EmptyPage,
    ListingFailed,
}

enum WalkState {
    Listing,
    Dispatching(MessagePage),
    Done(WalkEnd),
}

pub struct MailboxWalker<P: MailboxProvider> {
    provider: Arc<P>,
    budget: ProcessingBudget,
    concurrency: usize,
    retry_delay: Duration,
    max_retries: Option<u32>,
    sink: Arc<dyn ProgressSink>,
}

impl<P: MailboxProvider> MailboxWalker<P> {
    pub fn new(provider: Arc<P>, config: &RunConfig, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            provider,
            budget: config.budget,
            concurrency: config.concurrency.max(1),
            retry_delay: config.list_retry_delay,
            max_retries: config.max_list_retries,
            sink,
        }
    }

    /// Walk the mailbox until the budget is spent or the mailbox runs out
    pub async fn walk<H>(&self, handler: &H) -> (WalkStats, WalkEnd)
    where
        H: MessageHandler + ?Sized,
    {
        let start = Instant::now();
        let mut stats = WalkStats::default();
        let mut cursor = MailboxCursor::default();
        let mut seen: HashSet<MessageId> = HashSet::new();
        let mut failures: u32 = 0;
        let mut state = WalkState::Listing;

        let end = loop {
            state = match state {
                WalkState::Listing => {
                    if self.budget.exhausted(cursor.processed) {
                        WalkState::Done(WalkEnd::BudgetReached)
                    } else {
                        match self
                            .provider
                            .list_message_ids(cursor.page_token.as_deref(), self.budget.page_size)
                            .await
                        {
                            Ok(page) => {
                                failures = 0;
                                stats.pages += 1;
                                debug!(
                                    "Page {}: {} ids, more: {}",
                                    stats.pages,
                                    page.ids.len(),
                                    page.next_page_token.is_some()
                                );
                                if page.ids.is_empty() {
                                    WalkState::Done(WalkEnd::EmptyPage)
                                } else {
                                    WalkState::Dispatching(page)
                                }
                            }
                            Err(e) => {
                                failures += 1;
                                if self.max_retries.is_some_and(|max| failures > max) {
                                    warn!("Listing failed {} times in a row: {:#}", failures, e);
                                    self.sink.line(&format!(
                                        "Error fetching messages: {:#}. Giving up after {} attempts.",
                                        e, failures
                                    ));
                                    WalkState::Done(WalkEnd::ListingFailed)
                                } else {
                                    stats.retries += 1;
                                    self.sink.line(&format!(
                                        "Error fetching messages: {:#}. Retrying in {} seconds...",
                                        e,
                                        self.retry_delay.as_secs()
                                    ));
                                    tokio::time::sleep(self.retry_delay).await;
                                    WalkState::Listing
                                }
                            }
                        }
                    }
                }
                WalkState::Dispatching(page) => {
                    let ids: Vec<MessageId> = page
                        .ids
                        .into_iter()
                        .filter(|id| seen.insert(id.clone()))
                        .collect();

                    let errors = self.dispatch(handler, &ids).await;
                    stats.messages_dispatched += ids.len();
                    stats.errors += errors;
                    cursor.processed += ids.len();

                    match page.next_page_token {
                        Some(token) => {
                            cursor.page_token = Some(token);
                            WalkState::Listing
                        }
                        None => WalkState::Done(WalkEnd::LastPage),
                    }
                }
                WalkState::Done(end) => break end,
            };
        };

        stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Walk finished ({:?}): {} pages, {} messages, {} errors, {} retries in {} ms",
            end,
            stats.pages,
            stats.messages_dispatched,
            stats.errors,
            stats.retries,
            stats.duration_ms
        );
        (stats, end)
    }

    /// Run the handler over one page under the concurrency cap; returns the error count
    async fn dispatch<H>(&self, handler: &H, ids: &[MessageId]) -> usize
    where
        H: MessageHandler + ?Sized,
    {
        let errors = AtomicUsize::new(0);

        stream::iter(ids)
            .for_each_concurrent(self.concurrency, |id| {
                let errors = &errors;
                async move {
                    if let Err(e) = handler.handle(id).await {
                        errors.fetch_add(1, Ordering::Relaxed);
                        warn!("Message {} failed: {:#}", id, e);
                        self.sink
                            .line(&format!("Error processing message {}: {:#}", id, e));
                    }
                }
            })
            .await;

        errors.into_inner()
    }
}
