//! CRUD Engine Errors

use crate::event_store::EventStoreError;

/// Errors surfaced by the CRUD engine
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    /// No events exist for the originator, or the requested version has
    /// not been produced yet
    #[error("not found")]
    NotFound,

    /// The latest event for the originator is a tombstone
    #[error("deleted")]
    Deleted,

    /// Optimistic-concurrency conflict: the target version already exists
    #[error("duplicate: {id} already has version {version}")]
    Duplicate { id: String, version: u64 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Stored payloads could not be parsed or folded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend failure below the engine
    #[error(transparent)]
    Store(EventStoreError),
}

impl CrudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CrudError::NotFound)
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, CrudError::Deleted)
    }

    /// Check for a version conflict; callers retry on fresh state
    pub fn is_duplicate(&self) -> bool {
        matches!(self, CrudError::Duplicate { .. })
    }
}

impl From<EventStoreError> for CrudError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::Duplicate { id, version } => CrudError::Duplicate { id, version },
            EventStoreError::InvalidArgument(msg) => CrudError::InvalidArgument(msg),
            other => CrudError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_duplicate_maps_to_crud_duplicate() {
        let err: CrudError = EventStoreError::Duplicate {
            id: "u1".to_string(),
            version: 2,
        }
        .into();
        assert!(err.is_duplicate());
        assert!(!err.is_not_found());
    }
}
