//! In-memory checkpoint store

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{validate_checkpoint, Checkpoint, ConsumerStore, ConsumerStoreError};

/// Checkpoints held in a process-local map.
#[derive(Default)]
pub struct InMemoryConsumerStore {
    progress: RwLock<BTreeMap<String, u64>>,
}

impl InMemoryConsumerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all checkpoints (test helper)
    pub fn cleanup(&self) {
        self.progress.write().expect("checkpoint lock poisoned").clear();
    }
}

#[async_trait]
impl ConsumerStore for InMemoryConsumerStore {
    async fn log_consume(&self, checkpoint: Checkpoint) -> Result<(), ConsumerStoreError> {
        validate_checkpoint(&checkpoint)?;

        self.progress
            .write()
            .expect("checkpoint lock poisoned")
            .insert(checkpoint.consumer_id, checkpoint.offset);

        Ok(())
    }

    async fn get_log_consume(&self, consumer_id: &str) -> Result<Checkpoint, ConsumerStoreError> {
        if consumer_id.is_empty() {
            return Err(ConsumerStoreError::InvalidArgument(
                "missing consumer id".to_string(),
            ));
        }

        let progress = self.progress.read().expect("checkpoint lock poisoned");
        match progress.get(consumer_id) {
            Some(&offset) => Ok(Checkpoint {
                consumer_id: consumer_id.to_string(),
                offset,
            }),
            None => Err(ConsumerStoreError::NotFound(consumer_id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Checkpoint>, ConsumerStoreError> {
        let progress = self.progress.read().expect("checkpoint lock poisoned");
        Ok(progress
            .iter()
            .map(|(consumer_id, &offset)| Checkpoint {
                consumer_id: consumer_id.clone(),
                offset,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = InMemoryConsumerStore::new();

        let err = store.get_log_consume("c1").await.unwrap_err();
        assert!(err.is_not_found());

        store
            .log_consume(Checkpoint {
                consumer_id: "c1".to_string(),
                offset: 5,
            })
            .await
            .unwrap();

        let checkpoint = store.get_log_consume("c1").await.unwrap();
        assert_eq!(checkpoint.offset, 5);

        // upsert moves the offset forward
        store
            .log_consume(Checkpoint {
                consumer_id: "c1".to_string(),
                offset: 9,
            })
            .await
            .unwrap();
        assert_eq!(store.get_log_consume("c1").await.unwrap().offset, 9);
    }

    #[tokio::test]
    async fn test_rewrite_same_values_is_a_noop() {
        let store = InMemoryConsumerStore::new();
        let checkpoint = Checkpoint {
            consumer_id: "c1".to_string(),
            offset: 3,
        };

        store.log_consume(checkpoint.clone()).await.unwrap();
        store.log_consume(checkpoint.clone()).await.unwrap();

        assert_eq!(store.get_log_consume("c1").await.unwrap(), checkpoint);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_empty_id_and_zero_offset() {
        let store = InMemoryConsumerStore::new();

        let err = store
            .log_consume(Checkpoint {
                consumer_id: String::new(),
                offset: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumerStoreError::InvalidArgument(_)));

        let err = store
            .log_consume(Checkpoint {
                consumer_id: "c1".to_string(),
                offset: 0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConsumerStoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_list_returns_all_consumers() {
        let store = InMemoryConsumerStore::new();
        for (id, offset) in [("a", 1), ("b", 2), ("c", 3)] {
            store
                .log_consume(Checkpoint {
                    consumer_id: id.to_string(),
                    offset,
                })
                .await
                .unwrap();
        }

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
