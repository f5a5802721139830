//! Entity-type specifications
//!
//! Registered per entity type in the schema registry; the registry stores
//! these as ordinary CRUD entities under a reserved type.

use serde::{Deserialize, Serialize};

/// Versioned validation schema for an entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    /// Version of the schema; bumped on every change
    pub schema_version: u64,

    /// Optional JSON Schema source. Empty means no validation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub json_schema: String,
}

impl SchemaSpec {
    /// Whether this spec actually constrains payloads
    pub fn has_schema(&self) -> bool {
        !self.json_schema.is_empty()
    }
}

/// Complete registration record for a CRUD entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrudEntitySpec {
    /// The entity type this spec applies to (e.g. `User`, `acme.Order`)
    pub entity_type: String,

    /// Schema and validation rules, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_spec: Option<SchemaSpec>,
}

impl CrudEntitySpec {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            schema_spec: None,
        }
    }

    pub fn with_schema(mut self, schema_version: u64, json_schema: impl Into<String>) -> Self {
        self.schema_spec = Some(SchemaSpec {
            schema_version,
            json_schema: json_schema.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_round_trip() {
        let spec = CrudEntitySpec::new("User").with_schema(2, r#"{"type":"object"}"#);
        let json = serde_json::to_string(&spec).unwrap();
        let back: CrudEntitySpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
        assert!(back.schema_spec.unwrap().has_schema());
    }

    #[test]
    fn test_empty_schema_is_skipped_in_json() {
        let spec = CrudEntitySpec::new("User").with_schema(1, "");
        let json = serde_json::to_string(&spec).unwrap();
        assert!(!json.contains("json_schema"));
    }
}
