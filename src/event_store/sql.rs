//! Postgres event store
//!
//! Stream and log writes happen in one transaction so a failed append
//! leaves nothing behind. The unique index on
//! `(originator_id, originator_version)` is the last line of defense
//! against racing writers.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use async_trait::async_trait;

use crate::retry;
use crate::types::{AppLogEntry, Event, Originator};

use super::{validate_append, EventStore, EventStoreError, DEFAULT_LOG_PAGE};

/// Postgres-backed event store.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: PgPool,
}

impl SqlStore {
    /// Wrap an existing pool. Assumes [`migrate`](Self::migrate) has run.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given DSN under the normal retry profile and
    /// ensure the schema exists
    pub async fn connect(db_uri: &str) -> Result<Self, EventStoreError> {
        let pool = retry::retry_normal(|| async {
            PgPoolOptions::new().max_connections(10).connect(db_uri).await
        })
        .await?;

        Self::migrate(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Create the stream and log tables if they do not exist
    pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS es_events (
                originator_id      TEXT        NOT NULL,
                originator_version BIGINT      NOT NULL,
                event_type         TEXT        NOT NULL,
                payload            TEXT        NOT NULL,
                created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE (originator_id, originator_version)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS es_log (
                id             BIGSERIAL   PRIMARY KEY,
                application_id TEXT        NOT NULL DEFAULT 'consumer',
                partition_id   TEXT        NOT NULL,
                event_payload  TEXT        NOT NULL,
                created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_es_log_app_partition
            ON es_log (application_id, partition_id)
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Drop and recreate the tables (test helper)
    pub async fn cleanup(&self) -> Result<(), sqlx::Error> {
        sqlx::query("DROP TABLE IF EXISTS es_events").execute(&self.pool).await?;
        sqlx::query("DROP TABLE IF EXISTS es_log").execute(&self.pool).await?;
        Self::migrate(&self.pool).await
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl EventStore for SqlStore {
    async fn append(&self, event: Event) -> Result<(), EventStoreError> {
        validate_append(&event)?;

        let partition = event.partition().to_string();
        let event_json = serde_json::to_string(&event)?;

        let mut tx = self.pool.begin().await?;

        // Version check inside the transaction; the unique index catches
        // whatever slips through between racing transactions.
        let current: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(originator_version) FROM es_events WHERE originator_id = $1
            "#,
        )
        .bind(&event.originator.id)
        .fetch_optional(&mut *tx)
        .await?
        .flatten();

        let current = current.unwrap_or(0) as u64;
        if event.originator.version <= current {
            return Err(EventStoreError::Duplicate {
                id: event.originator.id.clone(),
                version: event.originator.version,
            });
        }

        let insert = sqlx::query(
            r#"
            INSERT INTO es_events (originator_id, originator_version, event_type, payload, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&event.originator.id)
        .bind(event.originator.version as i64)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(event.occurred_on)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            if is_unique_violation(&e) {
                return Err(EventStoreError::Duplicate {
                    id: event.originator.id.clone(),
                    version: event.originator.version,
                });
            }
            return Err(e.into());
        }

        let log_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO es_log (partition_id, event_payload)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(&partition)
        .bind(&event_json)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            originator_id = %event.originator.id,
            version = event.originator.version,
            log_id,
            event_type = %event.event_type,
            "event appended"
        );

        Ok(())
    }

    async fn get(
        &self,
        originator: &Originator,
        from_version: bool,
    ) -> Result<Vec<Event>, EventStoreError> {
        type Row = (String, i64, String, String, DateTime<Utc>);

        let rows: Vec<Row> = if originator.version == 0 {
            sqlx::query_as(
                r#"
                SELECT originator_id, originator_version, event_type, payload, created_at
                FROM es_events
                WHERE originator_id = $1
                ORDER BY originator_version
                "#,
            )
            .bind(&originator.id)
            .fetch_all(&self.pool)
            .await?
        } else if from_version {
            sqlx::query_as(
                r#"
                SELECT originator_id, originator_version, event_type, payload, created_at
                FROM es_events
                WHERE originator_id = $1 AND originator_version >= $2
                ORDER BY originator_version
                "#,
            )
            .bind(&originator.id)
            .bind(originator.version as i64)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT originator_id, originator_version, event_type, payload, created_at
                FROM es_events
                WHERE originator_id = $1 AND originator_version <= $2
                ORDER BY originator_version
                "#,
            )
            .bind(&originator.id)
            .bind(originator.version as i64)
            .fetch_all(&self.pool)
            .await?
        };

        let events = rows
            .into_iter()
            .map(|(id, version, event_type, payload, created_at)| Event {
                originator: Originator::new(id, version as u64),
                event_type,
                payload,
                occurred_on: created_at,
            })
            .collect();

        Ok(events)
    }

    async fn logs(
        &self,
        from_id: u64,
        size: u32,
        partition: Option<&str>,
    ) -> Result<Vec<AppLogEntry>, EventStoreError> {
        let size = if size == 0 { DEFAULT_LOG_PAGE } else { size };

        let rows: Vec<(i64, String)> = match partition {
            Some(p) => {
                sqlx::query_as(
                    r#"
                    SELECT id, event_payload FROM es_log
                    WHERE id >= $1 AND partition_id = $2
                    ORDER BY id
                    LIMIT $3
                    "#,
                )
                .bind(from_id as i64)
                .bind(p)
                .bind(size as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, event_payload FROM es_log
                    WHERE id >= $1
                    ORDER BY id
                    LIMIT $2
                    "#,
                )
                .bind(from_id as i64)
                .bind(size as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut entries = Vec::with_capacity(rows.len());
        for (id, payload) in rows {
            let event: Event = serde_json::from_str(&payload)?;
            entries.push(AppLogEntry::new(id as u64, event));
        }

        Ok(entries)
    }

    async fn partitions(&self) -> Result<Vec<String>, EventStoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT partition_id FROM es_log
            WHERE partition_id <> ''
            ORDER BY partition_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(p,)| p).collect())
    }
}
