//! Application log entries
//!
//! The application log is the sequential stream of every event in the
//! system. Entry ids are auto-incremented with no gaps (1, 2, 3, ...) and
//! define the global total order across all entities.

use serde::{Deserialize, Serialize};

use super::Event;

/// An event plus its position in the global log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLogEntry {
    /// Sequential id in the application log, starting at 1
    pub id: u64,

    /// The event stored at this position
    pub event: Event,
}

impl AppLogEntry {
    pub fn new(id: u64, event: Event) -> Self {
        Self { id, event }
    }
}
