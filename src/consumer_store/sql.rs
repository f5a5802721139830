//! Postgres checkpoint store

use sqlx::PgPool;

use async_trait::async_trait;

use super::{validate_checkpoint, Checkpoint, ConsumerStore, ConsumerStoreError};

/// Checkpoints in a single `es_checkpoints` table, one row per consumer.
#[derive(Debug, Clone)]
pub struct SqlConsumerStore {
    pool: PgPool,
}

impl SqlConsumerStore {
    /// Wrap an existing pool. Assumes [`migrate`](Self::migrate) has run.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the checkpoint table if it does not exist
    pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS es_checkpoints (
                id         TEXT        PRIMARY KEY,
                "offset"   BIGINT      NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ConsumerStore for SqlConsumerStore {
    async fn log_consume(&self, checkpoint: Checkpoint) -> Result<(), ConsumerStoreError> {
        validate_checkpoint(&checkpoint)?;

        sqlx::query(
            r#"
            INSERT INTO es_checkpoints (id, "offset")
            VALUES ($1, $2)
            ON CONFLICT (id)
            DO UPDATE SET "offset" = $2, updated_at = NOW()
            "#,
        )
        .bind(&checkpoint.consumer_id)
        .bind(checkpoint.offset as i64)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            consumer_id = %checkpoint.consumer_id,
            offset = checkpoint.offset,
            "checkpoint advanced"
        );

        Ok(())
    }

    async fn get_log_consume(&self, consumer_id: &str) -> Result<Checkpoint, ConsumerStoreError> {
        if consumer_id.is_empty() {
            return Err(ConsumerStoreError::InvalidArgument(
                "missing consumer id".to_string(),
            ));
        }

        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT "offset" FROM es_checkpoints WHERE id = $1
            "#,
        )
        .bind(consumer_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((offset,)) => Ok(Checkpoint {
                consumer_id: consumer_id.to_string(),
                offset: offset as u64,
            }),
            None => Err(ConsumerStoreError::NotFound(consumer_id.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Checkpoint>, ConsumerStoreError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT id, "offset" FROM es_checkpoints ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(consumer_id, offset)| Checkpoint {
                consumer_id,
                offset: offset as u64,
            })
            .collect())
    }
}
