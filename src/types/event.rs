//! Events
//!
//! Immutable records of state changes. The event type carries the
//! partition in its prefix: everything before the final dot is the entity
//! component, the suffix is the action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Originator;

/// A domain event as stored in a per-entity stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The entity instance this event belongs to
    pub originator: Originator,

    /// Type in the format `Entity.Action` (e.g. `User.Created`); the
    /// entity side may itself contain dots (`acme.billing.Invoice.Paid`)
    pub event_type: String,

    /// JSON-encoded event data
    pub payload: String,

    /// UTC timestamp of when the event occurred
    pub occurred_on: DateTime<Utc>,
}

impl Event {
    /// Create a new event stamped with the current time
    pub fn new(
        originator: Originator,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            originator,
            event_type: event_type.into(),
            payload: payload.into(),
            occurred_on: Utc::now(),
        }
    }

    /// The entity component: everything before the final dot.
    ///
    /// An event type without a dot is its own partition.
    pub fn partition(&self) -> &str {
        partition_of(&self.event_type)
    }

    /// The action component: everything after the final dot
    pub fn action(&self) -> &str {
        action_of(&self.event_type)
    }
}

/// Entity component of an event-type string
pub(crate) fn partition_of(event_type: &str) -> &str {
    match event_type.rfind('.') {
        Some(idx) => &event_type[..idx],
        None => event_type,
    }
}

/// Action component of an event-type string
pub(crate) fn action_of(event_type: &str) -> &str {
    match event_type.rfind('.') {
        Some(idx) => &event_type[idx + 1..],
        None => event_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_and_action_split() {
        let event = Event::new(Originator::new("u1", 1), "User.Created", "{}");
        assert_eq!(event.partition(), "User");
        assert_eq!(event.action(), "Created");
    }

    #[test]
    fn test_partition_with_namespaced_entity() {
        let event = Event::new(
            Originator::new("i1", 1),
            "acme.billing.Invoice.Paid",
            "{}",
        );
        assert_eq!(event.partition(), "acme.billing.Invoice");
        assert_eq!(event.action(), "Paid");
    }

    #[test]
    fn test_dotless_type_is_its_own_partition() {
        let event = Event::new(Originator::new("x", 1), "Heartbeat", "{}");
        assert_eq!(event.partition(), "Heartbeat");
        assert_eq!(event.action(), "Heartbeat");
    }

    #[test]
    fn test_json_round_trip_preserves_fields() {
        let event = Event::new(Originator::new("u1", 2), "User.Updated", r#"{"name":"b"}"#);
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.originator, event.originator);
        assert_eq!(back.event_type, event.event_type);
        assert_eq!(back.payload, event.payload);
    }
}
