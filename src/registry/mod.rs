//! Schema Registry
//!
//! Entity-type specs are themselves CRUD entities stored under a reserved
//! type, so the registry is self-hosted: register/update/list are plain
//! create/update/list over that type. Payload validation compiles the
//! stored JSON Schema on demand.

use std::sync::Arc;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::crud::{CrudError, CrudStore};
use crate::event_store::EventStore;
use crate::types::{CrudEntitySpec, Originator};

/// Reserved entity type the registry stores its specs under
pub const REGISTER_TYPE_ENTITY: &str = "eskit.RegisterTypeEntity";

/// Default page size for `list_types`
const DEFAULT_TYPES_LIMIT: usize = 20;

/// Errors surfaced by the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No spec registered for the entity type
    #[error("type not registered")]
    NotFound,

    /// The entity type is already registered
    #[error("type {0:?} already registered")]
    Duplicate(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure in the underlying CRUD engine
    #[error(transparent)]
    Crud(CrudError),
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound)
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RegistryError::Duplicate(_))
    }
}

/// Self-hosted registry of entity-type specs.
pub struct SchemaRegistry {
    crud: CrudStore,
}

impl SchemaRegistry {
    /// Build a registry over the given store.
    ///
    /// The registry drives its own non-validating CRUD engine, so spec
    /// writes never recurse into validation.
    pub fn new(estore: Arc<dyn EventStore>) -> Self {
        Self {
            crud: CrudStore::new(estore),
        }
    }

    /// Register a new entity type.
    ///
    /// An already-registered type fails with `Duplicate` unless
    /// `skip_duplicate` makes registration idempotent. A non-empty schema
    /// must compile and carry a version of at least 1.
    pub async fn register_type(
        &self,
        spec: &CrudEntitySpec,
        skip_duplicate: bool,
    ) -> Result<(), RegistryError> {
        if spec.entity_type.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "missing entity type".to_string(),
            ));
        }

        if self.spec_for(&spec.entity_type).await?.is_some() {
            if skip_duplicate {
                return Ok(());
            }
            return Err(RegistryError::Duplicate(spec.entity_type.clone()));
        }

        check_schema(spec)?;

        let originator = Originator::new(spec.entity_type.clone(), 1);
        let payload = serde_json::to_string(spec)?;

        tracing::info!(entity_type = %spec.entity_type, "registering entity type");

        self.crud
            .create(REGISTER_TYPE_ENTITY, &originator, &payload)
            .await
            .map_err(RegistryError::Crud)?;

        Ok(())
    }

    /// Replace the spec of a registered type.
    ///
    /// The new `schema_version` must be strictly greater than the stored
    /// one; identical or smaller versions fail with `InvalidArgument`.
    pub async fn update_type(&self, spec: &CrudEntitySpec) -> Result<(), RegistryError> {
        if spec.entity_type.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "missing entity type".to_string(),
            ));
        }

        let Some((old_spec, originator)) = self.spec_for(&spec.entity_type).await? else {
            return Err(RegistryError::NotFound);
        };

        check_schema(spec)?;

        let old_version = old_spec
            .schema_spec
            .as_ref()
            .map(|s| s.schema_version)
            .unwrap_or(0);
        let new_version = spec
            .schema_spec
            .as_ref()
            .map(|s| s.schema_version)
            .unwrap_or(0);
        if new_version <= old_version {
            return Err(RegistryError::InvalidArgument(format!(
                "schema version must be bumped: stored {old_version}, got {new_version}"
            )));
        }

        let payload = serde_json::to_string(spec)?;
        self.crud
            .update(REGISTER_TYPE_ENTITY, &originator, &payload)
            .await
            .map_err(RegistryError::Crud)?;

        Ok(())
    }

    /// The stored spec for an entity type
    pub async fn get_type(&self, entity_type: &str) -> Result<CrudEntitySpec, RegistryError> {
        if entity_type.is_empty() {
            return Err(RegistryError::InvalidArgument(
                "missing entity type".to_string(),
            ));
        }

        match self.spec_for(entity_type).await? {
            Some((spec, _)) => Ok(spec),
            None => Err(RegistryError::NotFound),
        }
    }

    /// All registered specs, up to `limit` (0 means 20)
    pub async fn list_types(&self, limit: usize) -> Result<Vec<CrudEntitySpec>, RegistryError> {
        let limit = if limit == 0 { DEFAULT_TYPES_LIMIT } else { limit };

        let (originators, _) = self
            .crud
            .list(REGISTER_TYPE_ENTITY, 0, limit)
            .await
            .map_err(RegistryError::Crud)?;

        let mut specs = Vec::with_capacity(originators.len());
        for originator in originators {
            let (payload, _) = match self.crud.get(&originator, false).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(id = %originator.id, error = %e, "skipping unreadable spec");
                    continue;
                }
            };
            specs.push(serde_json::from_str(&payload)?);
        }

        Ok(specs)
    }

    /// Validate a payload of the given type against its registered
    /// schema. Unregistered types and empty schemas accept everything.
    pub async fn validate(&self, entity_type: &str, payload: &str) -> Result<(), RegistryError> {
        let Some((spec, _)) = self.spec_for(entity_type).await? else {
            return Ok(());
        };

        let Some(schema_spec) = &spec.schema_spec else {
            return Ok(());
        };
        if !schema_spec.has_schema() {
            return Ok(());
        }

        let schema: Value = serde_json::from_str(&schema_spec.json_schema)?;
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| RegistryError::InvalidArgument(format!("invalid stored schema: {e}")))?;

        let document: Value = serde_json::from_str(payload)
            .map_err(|e| RegistryError::InvalidArgument(format!("payload is not valid JSON: {e}")))?;

        if let Err(errors) = compiled.validate(&document) {
            let details: Vec<String> = errors.map(|e| e.to_string()).collect();
            return Err(RegistryError::InvalidArgument(format!(
                "schema constraint failed: {}",
                details.join("; ")
            )));
        }

        Ok(())
    }

    async fn spec_for(
        &self,
        entity_type: &str,
    ) -> Result<Option<(CrudEntitySpec, Originator)>, RegistryError> {
        let found = self
            .crud
            .get(&Originator::latest(entity_type), false)
            .await;

        let (payload, originator) = match found {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(RegistryError::Crud(e)),
        };

        let spec: CrudEntitySpec = serde_json::from_str(&payload)?;
        Ok(Some((spec, originator)))
    }
}

/// A non-empty schema must compile and carry a version
fn check_schema(spec: &CrudEntitySpec) -> Result<(), RegistryError> {
    let Some(schema_spec) = &spec.schema_spec else {
        return Ok(());
    };
    if !schema_spec.has_schema() {
        return Ok(());
    }

    if schema_spec.schema_version == 0 {
        return Err(RegistryError::InvalidArgument(
            "schema version is required".to_string(),
        ));
    }

    let schema: Value = serde_json::from_str(&schema_spec.json_schema)
        .map_err(|e| RegistryError::InvalidArgument(format!("schema is not valid JSON: {e}")))?;
    JSONSchema::compile(&schema)
        .map_err(|e| RegistryError::InvalidArgument(format!("schema does not compile: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryStore;

    const USER_SCHEMA: &str = r#"{
        "type": "object",
        "required": ["email", "firstName"],
        "properties": {
            "email": {"type": "string", "minLength": 3},
            "firstName": {"type": "string", "minLength": 3}
        }
    }"#;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_register_and_get_type() {
        let registry = registry();
        let spec = CrudEntitySpec::new("User").with_schema(1, USER_SCHEMA);

        registry.register_type(&spec, false).await.unwrap();

        let stored = registry.get_type("User").await.unwrap();
        assert_eq!(stored, spec);
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let registry = registry();
        let spec = CrudEntitySpec::new("User");

        registry.register_type(&spec, false).await.unwrap();

        let err = registry.register_type(&spec, false).await.unwrap_err();
        assert!(err.is_duplicate());

        // idempotent form is a no-op
        registry.register_type(&spec, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_register_rejects_bad_schemas() {
        let registry = registry();

        // unversioned schema
        let spec = CrudEntitySpec::new("User").with_schema(0, USER_SCHEMA);
        let err = registry.register_type(&spec, false).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));

        // schema that is not JSON at all
        let spec = CrudEntitySpec::new("User").with_schema(1, "not json");
        let err = registry.register_type(&spec, false).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_update_type_requires_version_bump() {
        let registry = registry();
        let spec = CrudEntitySpec::new("User").with_schema(1, USER_SCHEMA);
        registry.register_type(&spec, false).await.unwrap();

        // same version refused
        let err = registry.update_type(&spec).await.unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));

        // smaller version refused
        let stale = CrudEntitySpec::new("User").with_schema(0, USER_SCHEMA);
        assert!(registry.update_type(&stale).await.is_err());

        // bumped version accepted
        let bumped = CrudEntitySpec::new("User").with_schema(2, USER_SCHEMA);
        registry.update_type(&bumped).await.unwrap();

        let stored = registry.get_type("User").await.unwrap();
        assert_eq!(stored.schema_spec.unwrap().schema_version, 2);
    }

    #[tokio::test]
    async fn test_update_unknown_type_is_not_found() {
        let registry = registry();
        let spec = CrudEntitySpec::new("Ghost");
        let err = registry.update_type(&spec).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_validate_enforces_schema() {
        let registry = registry();
        let spec = CrudEntitySpec::new("User").with_schema(1, USER_SCHEMA);
        registry.register_type(&spec, false).await.unwrap();

        // firstName too short
        let err = registry
            .validate("User", r#"{"email":"a@b","firstName":"Wo"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidArgument(_)));

        registry
            .validate("User", r#"{"email":"a@b.c","firstName":"Worm"}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_without_registration_accepts() {
        let registry = registry();
        registry.validate("Unknown", r#"{"anything":1}"#).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_with_empty_schema_accepts() {
        let registry = registry();
        registry
            .register_type(&CrudEntitySpec::new("Free"), false)
            .await
            .unwrap();
        registry.validate("Free", r#"{"anything":1}"#).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_types() {
        let registry = registry();
        for name in ["User", "Order", "Invoice"] {
            registry
                .register_type(&CrudEntitySpec::new(name), false)
                .await
                .unwrap();
        }

        let specs = registry.list_types(0).await.unwrap();
        assert_eq!(specs.len(), 3);

        let limited = registry.list_types(2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
