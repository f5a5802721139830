//! Typed CRUD client
//!
//! Bridges language-native payload types and the string-payload CRUD
//! engine. Instead of discovering an `Originator` field by inspection,
//! payload types implement the small [`Entity`] capability: a type name
//! plus get/set of their originator.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crud::{CrudError, CrudStore};
use crate::types::Originator;

/// Capability a payload type needs to ride through the CRUD engine.
pub trait Entity: Serialize + DeserializeOwned {
    /// The entity type this value is stored under (the partition key)
    fn entity_type() -> &'static str;

    /// The originator carried by this value, if it has been assigned one
    fn originator(&self) -> Option<&Originator>;

    /// Attach the originator after a round-trip through storage
    fn set_originator(&mut self, originator: Originator);
}

/// Typed facade over a [`CrudStore`].
#[derive(Clone)]
pub struct CrudClient {
    crud: CrudStore,
}

impl CrudClient {
    pub fn new(crud: CrudStore) -> Self {
        Self { crud }
    }

    /// Store a new entity and stamp the assigned originator back onto it.
    ///
    /// A value without an originator gets a fresh v4 id at version 1.
    pub async fn create<T: Entity>(&self, msg: &mut T) -> Result<Originator, CrudError> {
        let originator = match msg.originator() {
            Some(o) => o.clone(),
            None => Originator::generate(),
        };

        let payload = serde_json::to_string(msg)?;
        let originator = self
            .crud
            .create(T::entity_type(), &originator, &payload)
            .await?;

        msg.set_originator(originator.clone());
        Ok(originator)
    }

    /// Load and materialize an entity at the requested version (0 for
    /// latest)
    pub async fn get<T: Entity>(
        &self,
        originator: &Originator,
        include_deleted: bool,
    ) -> Result<T, CrudError> {
        if originator.id.is_empty() {
            return Err(CrudError::InvalidArgument("empty originator".to_string()));
        }

        let (payload, latest) = self.crud.get(originator, include_deleted).await?;

        let mut msg: T = serde_json::from_str(&payload)?;
        msg.set_originator(latest);
        Ok(msg)
    }

    /// Persist the value's current state as an update.
    ///
    /// The value must carry the originator of the version it was loaded
    /// at; the new originator is stamped back on success.
    pub async fn update<T: Entity>(&self, msg: &mut T) -> Result<Originator, CrudError> {
        let originator = msg
            .originator()
            .cloned()
            .ok_or_else(|| CrudError::InvalidArgument("value has no originator".to_string()))?;

        let payload = serde_json::to_string(msg)?;
        let updated = self
            .crud
            .update(T::entity_type(), &originator, &payload)
            .await?;

        msg.set_originator(updated.clone());
        Ok(updated)
    }

    /// Tombstone the entity behind the originator
    pub async fn delete<T: Entity>(&self, originator: &Originator) -> Result<Originator, CrudError> {
        if originator.id.is_empty() {
            return Err(CrudError::InvalidArgument("empty originator".to_string()));
        }

        self.crud.delete(T::entity_type(), originator).await
    }

    /// Materialize a page of live entities in global log order.
    ///
    /// Entities that cannot be folded anymore (for example, deleted
    /// between the scan and the read) are skipped with a warning, so a
    /// page may come back short.
    pub async fn list<T: Entity>(
        &self,
        from_id: u64,
        size: usize,
    ) -> Result<(Vec<T>, Option<u64>), CrudError> {
        let (originators, next) = self.crud.list(T::entity_type(), from_id, size).await?;

        let mut results = Vec::with_capacity(originators.len());
        for originator in originators {
            let (payload, latest) = match self.crud.get(&originator, false).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(id = %originator.id, error = %e, "skipping unreadable entity");
                    continue;
                }
            };

            let mut msg: T = serde_json::from_str(&payload)?;
            msg.set_originator(latest);
            results.push(msg);
        }

        Ok((results, next))
    }
}
