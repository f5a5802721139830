//! Originator identity
//!
//! An originator pins an entity instance to a point in its history.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies an entity instance and its version.
///
/// The `(id, version)` pair is unique across all events; versions of a
/// given id form a strictly increasing sequence starting at 1. Version 0
/// is the "unversioned" form used in read requests to mean "latest".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Originator {
    /// Unique identifier of the entity (a UUID by convention)
    pub id: String,

    /// Version number, used for optimistic locking
    #[serde(default)]
    pub version: u64,
}

impl Originator {
    /// Create an originator with an explicit id and version
    pub fn new(id: impl Into<String>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Create a fresh originator with a random v4 id at version 1
    pub fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            version: 1,
        }
    }

    /// An id-only originator, as used by read requests for "latest"
    pub fn latest(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: 0,
        }
    }

    /// The same id one version further
    pub fn next(&self) -> Self {
        Self {
            id: self.id.clone(),
            version: self.version + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_starts_at_version_one() {
        let originator = Originator::generate();
        assert_eq!(originator.version, 1);
        assert!(Uuid::parse_str(&originator.id).is_ok());
    }

    #[test]
    fn test_next_bumps_version_only() {
        let originator = Originator::new("abc", 3);
        let next = originator.next();
        assert_eq!(next.id, "abc");
        assert_eq!(next.version, 4);
    }

    #[test]
    fn test_json_round_trip() {
        let originator = Originator::new("abc", 7);
        let json = serde_json::to_string(&originator).unwrap();
        let back: Originator = serde_json::from_str(&json).unwrap();
        assert_eq!(originator, back);
    }

    #[test]
    fn test_missing_version_defaults_to_zero() {
        let back: Originator = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(back.version, 0);
    }
}
