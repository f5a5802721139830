//! Event Store
//!
//! Durable append-only storage for per-entity event streams plus the
//! global application log. Two backends implement the same contract: an
//! in-memory store for tests and local development, and a Postgres store.
//! The backend is picked from the `DB_URI` scheme by [`connect`].

mod error;
mod memory;
mod sql;

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{AppLogEntry, Event, Originator};

pub use error::EventStoreError;
pub use memory::InMemoryStore;
pub use sql::SqlStore;

/// URI selecting the in-memory backend
pub const INMEMORY_URI: &str = "inmemory://";

/// Page size used by `logs` when the caller passes zero
pub const DEFAULT_LOG_PAGE: u32 = 20;

/// The event store contract shared by all backends.
///
/// Appends are atomic over both the per-entity stream and the global log;
/// concurrent appends against the same originator serialize, and two
/// successful appends can never produce the same version.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append an event to its entity stream and the global log.
    ///
    /// The event's version must be strictly greater than the highest
    /// stored version for its originator id (zero when the stream is
    /// empty). Gap discipline is left to callers. A conflicting version
    /// fails with [`EventStoreError::Duplicate`] and leaves nothing
    /// behind.
    async fn append(&self, event: Event) -> Result<(), EventStoreError>;

    /// Fetch the event stream of one originator, ordered by version.
    ///
    /// A zero version returns the full stream. Otherwise `from_version`
    /// selects the direction: `false` returns versions up to and
    /// including the requested one, `true` returns the requested one and
    /// later. A missing id yields an empty vec, not an error.
    async fn get(
        &self,
        originator: &Originator,
        from_version: bool,
    ) -> Result<Vec<Event>, EventStoreError>;

    /// Scan the global log from `from_id` (inclusive), ascending.
    ///
    /// Returns at most `size` entries (`0` means [`DEFAULT_LOG_PAGE`]).
    /// A partition filter restricts the scan to one entity component and
    /// applies before the size cap.
    async fn logs(
        &self,
        from_id: u64,
        size: u32,
        partition: Option<&str>,
    ) -> Result<Vec<AppLogEntry>, EventStoreError>;

    /// Distinct entity components currently present in the log, sorted
    async fn partitions(&self) -> Result<Vec<String>, EventStoreError>;
}

/// Open an event store for the given `DB_URI`.
///
/// `inmemory://` yields the in-memory backend; anything else is treated
/// as a Postgres DSN and connected under the normal retry profile.
pub async fn connect(db_uri: &str) -> Result<Arc<dyn EventStore>, EventStoreError> {
    if db_uri == INMEMORY_URI {
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let store = SqlStore::connect(db_uri).await?;
    Ok(Arc::new(store))
}

/// Preconditions shared by every backend's `append`
fn validate_append(event: &Event) -> Result<(), EventStoreError> {
    if event.originator.id.is_empty() {
        return Err(EventStoreError::InvalidArgument(
            "missing originator id".to_string(),
        ));
    }
    if event.originator.version == 0 {
        return Err(EventStoreError::InvalidArgument(
            "originator version must be at least 1".to_string(),
        ));
    }
    if event.event_type.is_empty() {
        return Err(EventStoreError::InvalidArgument(
            "missing event type".to_string(),
        ));
    }
    Ok(())
}
