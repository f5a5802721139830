//! Event Store Errors

/// Errors surfaced by event store backends
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    /// The `(originator id, version)` pair already exists, or the version
    /// is not ahead of the stored stream
    #[error("duplicate event for {id} at version {version}")]
    Duplicate { id: String, version: u64 },

    /// A precondition on the request failed
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backend I/O failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Check if this error is a version conflict / duplicate append
    pub fn is_duplicate(&self) -> bool {
        matches!(self, EventStoreError::Duplicate { .. })
    }
}
