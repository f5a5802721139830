//! Application log consumer
//!
//! Tails the global log with at-least-once delivery. Progress is
//! checkpointed per consumer after every successfully handled entry, so a
//! crashed consumer resumes where it left off; a handler may therefore
//! see an entry twice and must be idempotent.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::consumer_store::{Checkpoint, ConsumerStore, ConsumerStoreError};
use crate::event_store::{EventStore, EventStoreError};
use crate::retry;
use crate::selector::Selector;
use crate::types::AppLogEntry;

/// Where a consumer picks up the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Start at log id 1 regardless of any saved checkpoint
    FromBeginning,
    /// Resume after the saved checkpoint; a missing checkpoint means
    /// start at 1
    FromSaved,
}

/// Outcome a handler reports back to the consumer loop.
///
/// `Stop` and `Fatal` terminate the loop; anything else is retriable and
/// causes the failed entry to be re-fetched and redelivered.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("stop consumer: {0}")]
    Stop(String),

    #[error("fatal consumer error: {0}")]
    Fatal(String),

    #[error(transparent)]
    Retryable(#[from] anyhow::Error),
}

/// Errors surfaced by the consumer loop
#[derive(Debug, thiserror::Error)]
pub enum ConsumerError {
    /// The handler asked the consumer to stop
    #[error("consumer stopped: {0}")]
    Stopped(String),

    /// The handler hit an unrecoverable condition
    #[error("fatal consumer error: {0}")]
    Fatal(String),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    /// Checkpoint advance failed even after the short retry budget
    #[error(transparent)]
    Checkpoint(#[from] ConsumerStoreError),
}

/// Sleep between polls when the log has no new entries
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Entries fetched per log scan
const BATCH_SIZE: u32 = 10;

/// A named, checkpoint-resumable consumer of the application log.
///
/// Consumers with distinct names are independent; each owns its own
/// checkpoint. Within one consumer, entries are delivered in strictly
/// increasing log-id order.
pub struct AppLogConsumer {
    name: String,
    start: StartPosition,
    selector: Selector,
    estore: Arc<dyn EventStore>,
    checkpoints: Arc<dyn ConsumerStore>,
}

impl AppLogConsumer {
    pub fn new(
        estore: Arc<dyn EventStore>,
        checkpoints: Arc<dyn ConsumerStore>,
        name: impl Into<String>,
        start: StartPosition,
        selector: Selector,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            selector,
            estore,
            checkpoints,
        }
    }

    /// Consume log entries through `handler` until cancelled or the
    /// handler returns a `Stop`/`Fatal` sentinel.
    ///
    /// The checkpoint advances to the entry id after each successful
    /// invocation (under the short retry profile). On a retriable handler
    /// error the checkpoint stays put, the rest of the batch is dropped,
    /// and the fetch restarts at the failed entry. Cancellation returns
    /// `Ok(())`.
    pub async fn consume<F, Fut>(
        &self,
        cancel: CancellationToken,
        mut handler: F,
    ) -> Result<(), ConsumerError>
    where
        F: FnMut(AppLogEntry) -> Fut,
        Fut: Future<Output = Result<(), HandlerError>>,
    {
        let mut next_id = self.resolve_start().await?;
        tracing::info!(consumer = %self.name, from = next_id, "consuming application log");

        loop {
            let Some(batch) = self.fetch(&cancel, next_id).await else {
                return Ok(());
            };

            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    // transient fetch failures retry silently on the next poll
                    tracing::warn!(consumer = %self.name, error = %e, "log fetch failed");
                    if !self.poll_sleep(&cancel).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            if batch.is_empty() {
                if !self.poll_sleep(&cancel).await {
                    return Ok(());
                }
                continue;
            }

            'batch: for entry in batch {
                let entry_id = entry.id;

                if self.selector.matches(&entry.event) {
                    match handler(entry).await {
                        Ok(()) => self.save_progress(entry_id).await?,
                        Err(HandlerError::Stop(reason)) => {
                            return Err(ConsumerError::Stopped(reason))
                        }
                        Err(HandlerError::Fatal(reason)) => {
                            return Err(ConsumerError::Fatal(reason))
                        }
                        Err(HandlerError::Retryable(e)) => {
                            tracing::warn!(
                                consumer = %self.name,
                                log_id = entry_id,
                                error = %e,
                                "handler failed, re-fetching from the same position"
                            );
                            next_id = entry_id;
                            break 'batch;
                        }
                    }
                }

                next_id = entry_id + 1;
            }
        }
    }

    /// Raw two-channel tail of the log: matching entries on the first
    /// channel, a terminal fetch error (if any) on the second.
    ///
    /// Both channels close exactly once, when the producer task exits —
    /// on cancellation, on a fetch error, or when the entry receiver is
    /// dropped. No checkpointing happens here.
    pub async fn stream(
        &self,
        cancel: CancellationToken,
    ) -> Result<(mpsc::Receiver<AppLogEntry>, mpsc::Receiver<ConsumerError>), ConsumerError> {
        let mut next_id = self.resolve_start().await?;

        let (entry_tx, entry_rx) = mpsc::channel(BATCH_SIZE as usize);
        let (err_tx, err_rx) = mpsc::channel(1);

        let estore = Arc::clone(&self.estore);
        let selector = self.selector.clone();

        tokio::spawn(async move {
            loop {
                let batch = tokio::select! {
                    _ = cancel.cancelled() => return,
                    result = estore.logs(next_id, BATCH_SIZE, selector.partition_filter()) => result,
                };

                let batch = match batch {
                    Ok(batch) => batch,
                    Err(e) => {
                        let _ = err_tx.send(ConsumerError::Store(e)).await;
                        return;
                    }
                };

                if batch.is_empty() {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    }
                    continue;
                }

                for entry in batch {
                    next_id = entry.id + 1;
                    if selector.matches(&entry.event) && entry_tx.send(entry).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok((entry_rx, err_rx))
    }

    async fn resolve_start(&self) -> Result<u64, ConsumerError> {
        match self.start {
            StartPosition::FromBeginning => Ok(1),
            StartPosition::FromSaved => match self.checkpoints.get_log_consume(&self.name).await {
                Ok(checkpoint) => Ok(checkpoint.offset + 1),
                Err(e) if e.is_not_found() => Ok(1),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// One cancellable log scan; `None` means we were cancelled
    async fn fetch(
        &self,
        cancel: &CancellationToken,
        from_id: u64,
    ) -> Option<Result<Vec<AppLogEntry>, EventStoreError>> {
        tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.estore.logs(from_id, BATCH_SIZE, self.selector.partition_filter()) => {
                Some(result)
            }
        }
    }

    /// Sleep one poll interval; `false` means we were cancelled
    async fn poll_sleep(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(POLL_INTERVAL) => true,
        }
    }

    async fn save_progress(&self, offset: u64) -> Result<(), ConsumerStoreError> {
        retry::retry_short(|| async {
            self.checkpoints
                .log_consume(Checkpoint {
                    consumer_id: self.name.clone(),
                    offset,
                })
                .await
        })
        .await
    }
}
