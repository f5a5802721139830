//! Event selectors
//!
//! A selector is a two-part glob `EntityGlob.ActionGlob` used to filter
//! events; each side is either a literal or `*`. The empty string and `"*"`
//! are the match-all forms.

use crate::types::Event;

/// A parsed event selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    entity: String,
    action: String,
}

/// Selector parse failure
#[derive(Debug, thiserror::Error)]
#[error("invalid selector {0:?}: expected \"Entity.Action\", \"*\" or \"\"")]
pub struct InvalidSelector(pub String);

impl Selector {
    /// Parse a selector expression.
    ///
    /// `""` and `"*"` match everything. Anything else must contain a dot;
    /// the split happens at the final dot so namespaced entities
    /// (`acme.Order.*`) keep their prefix on the entity side.
    pub fn parse(expr: &str) -> Result<Self, InvalidSelector> {
        if expr.is_empty() || expr == "*" {
            return Ok(Self::match_all());
        }

        let Some(idx) = expr.rfind('.') else {
            return Err(InvalidSelector(expr.to_string()));
        };

        let (entity, action) = (&expr[..idx], &expr[idx + 1..]);
        if entity.is_empty() || action.is_empty() {
            return Err(InvalidSelector(expr.to_string()));
        }

        Ok(Self {
            entity: entity.to_string(),
            action: action.to_string(),
        })
    }

    /// The selector that accepts every event
    pub fn match_all() -> Self {
        Self {
            entity: "*".to_string(),
            action: "*".to_string(),
        }
    }

    /// Whether the event satisfies both sides of the glob
    pub fn matches(&self, event: &Event) -> bool {
        if self.entity != "*" && self.entity != event.partition() {
            return false;
        }
        if self.action != "*" && self.action != event.action() {
            return false;
        }
        true
    }

    /// The literal entity side, if there is one.
    ///
    /// Consumers push this down into the log scan as a partition filter.
    pub fn partition_filter(&self) -> Option<&str> {
        (self.entity != "*").then_some(self.entity.as_str())
    }
}
