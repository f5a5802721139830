//! In-memory event store
//!
//! Backend used by tests and local development. A single lock serializes
//! appends; readers see either the state before or after an append, never
//! in between.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::types::{AppLogEntry, Event, Originator};

use super::{validate_append, EventStore, EventStoreError, DEFAULT_LOG_PAGE};

#[derive(Default)]
struct Inner {
    /// Per-entity streams keyed by originator id, versions ascending
    streams: HashMap<String, Vec<Event>>,
    /// Global log; entry with id `n` sits at index `n - 1`
    log: Vec<AppLogEntry>,
}

/// Lock-serialized in-memory backend.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all streams and log entries (test helper)
    pub fn cleanup(&self) {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.streams.clear();
        inner.log.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryStore {
    async fn append(&self, event: Event) -> Result<(), EventStoreError> {
        validate_append(&event)?;

        let mut guard = self.inner.write().expect("store lock poisoned");
        let inner = &mut *guard;

        let stream = inner.streams.entry(event.originator.id.clone()).or_default();
        let current = stream.last().map(|e| e.originator.version).unwrap_or(0);
        if event.originator.version <= current {
            return Err(EventStoreError::Duplicate {
                id: event.originator.id.clone(),
                version: event.originator.version,
            });
        }

        stream.push(event.clone());
        let next_id = inner.log.len() as u64 + 1;
        inner.log.push(AppLogEntry::new(next_id, event));

        Ok(())
    }

    async fn get(
        &self,
        originator: &Originator,
        from_version: bool,
    ) -> Result<Vec<Event>, EventStoreError> {
        let inner = self.inner.read().expect("store lock poisoned");

        let Some(stream) = inner.streams.get(&originator.id) else {
            return Ok(Vec::new());
        };

        if originator.version == 0 {
            return Ok(stream.clone());
        }

        let wanted = originator.version;
        let events = stream
            .iter()
            .filter(|e| {
                if from_version {
                    e.originator.version >= wanted
                } else {
                    e.originator.version <= wanted
                }
            })
            .cloned()
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
        let inner = self.inner.read().expect("store lock poisoned");

        let start = from_id.saturating_sub(1) as usize;
        if start >= inner.log.len() {
            return Ok(Vec::new());
        }

        let entries = inner.log[start..]
            .iter()
            .filter(|entry| match partition {
                Some(p) => entry.event.partition() == p,
                None => true,
            })
            .take(size as usize)
            .cloned()
            .collect();

        Ok(entries)
    }

    async fn partitions(&self) -> Result<Vec<String>, EventStoreError> {
        let inner = self.inner.read().expect("store lock poisoned");

        let set: BTreeSet<&str> = inner
            .log
            .iter()
            .map(|entry| entry.event.partition())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(set.into_iter().map(String::from).collect())
    }
}
