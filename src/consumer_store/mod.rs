//! Consumer Store
//!
//! Per-consumer checkpointing over the application log. A checkpoint
//! means "this consumer has processed through log id = offset inclusive";
//! the consumer resumes at `offset + 1`.

mod memory;
mod sql;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::InMemoryConsumerStore;
pub use sql::SqlConsumerStore;

/// A consumer's saved position in the application log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub consumer_id: String,
    pub offset: u64,
}

/// Errors from checkpoint storage
#[derive(Debug, thiserror::Error)]
pub enum ConsumerStoreError {
    /// No checkpoint stored for the consumer
    #[error("no checkpoint for consumer {0:?}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ConsumerStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConsumerStoreError::NotFound(_))
    }
}

/// Checkpoint storage contract.
#[async_trait]
pub trait ConsumerStore: Send + Sync {
    /// Upsert the checkpoint. Rejects an empty consumer id or a zero
    /// offset. Re-writing the same values is a no-op at the value level.
    async fn log_consume(&self, checkpoint: Checkpoint) -> Result<(), ConsumerStoreError>;

    /// The stored checkpoint for the consumer, or `NotFound`
    async fn get_log_consume(&self, consumer_id: &str) -> Result<Checkpoint, ConsumerStoreError>;

    /// All stored checkpoints
    async fn list(&self) -> Result<Vec<Checkpoint>, ConsumerStoreError>;
}

pub(crate) fn validate_checkpoint(checkpoint: &Checkpoint) -> Result<(), ConsumerStoreError> {
    if checkpoint.consumer_id.is_empty() {
        return Err(ConsumerStoreError::InvalidArgument(
            "missing consumer id".to_string(),
        ));
    }
    if checkpoint.offset == 0 {
        return Err(ConsumerStoreError::InvalidArgument(
            "missing offset".to_string(),
        ));
    }
    Ok(())
}
