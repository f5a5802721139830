//! CRUD Engine
//!
//! Translates create/update/delete semantics into events over the event
//! store and reconstructs entity state on read by folding JSON Merge
//! Patches. The engine owns no state of its own; it is a pure function
//! over the store.

mod error;
pub(crate) mod patch;

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::event_store::EventStore;
use crate::registry::SchemaRegistry;
use crate::types::{Event, Originator};

pub use error::CrudError;

/// Log entries scanned per requested list item; listing is meant for
/// small objects with few versions
const LIST_SCAN_MULTIPLIER: usize = 20;

/// Default page size for `list`
const DEFAULT_LIST_SIZE: usize = 10;

/// CRUD projection engine over an event store.
#[derive(Clone)]
pub struct CrudStore {
    estore: Arc<dyn EventStore>,
    registry: Option<Arc<SchemaRegistry>>,
}

impl CrudStore {
    /// An engine without payload validation
    pub fn new(estore: Arc<dyn EventStore>) -> Self {
        Self {
            estore,
            registry: None,
        }
    }

    /// An engine that validates payloads against registered schemas
    /// before emitting `Created`/`Updated` events
    pub fn with_registry(estore: Arc<dyn EventStore>, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            estore,
            registry: Some(registry),
        }
    }

    /// Emit a `<entityType>.Created` event carrying the full payload.
    ///
    /// A zero version is promoted to 1. Returns the effective originator.
    /// Fails with `Duplicate` when the id already has events.
    pub async fn create(
        &self,
        entity_type: &str,
        originator: &Originator,
        payload: &str,
    ) -> Result<Originator, CrudError> {
        if entity_type.is_empty() {
            return Err(CrudError::InvalidArgument("missing entity type".to_string()));
        }
        if originator.id.is_empty() {
            return Err(CrudError::InvalidArgument("empty originator".to_string()));
        }

        self.validate(entity_type, payload).await?;

        let originator = if originator.version == 0 {
            Originator::new(originator.id.clone(), 1)
        } else {
            originator.clone()
        };

        let event = Event::new(
            originator.clone(),
            format!("{entity_type}.Created"),
            payload,
        );
        self.estore.append(event).await?;

        Ok(originator)
    }

    /// Diff the caller's desired full state against the state at the
    /// caller's version and emit `<entityType>.Updated` with the patch.
    ///
    /// The append happens at `originator.version + 1`; a racing writer
    /// that got there first makes this fail with `Duplicate`, and the
    /// caller retries on fresh state. Validation applies to the incoming
    /// full payload, before the diff.
    pub async fn update(
        &self,
        entity_type: &str,
        originator: &Originator,
        payload: &str,
    ) -> Result<Originator, CrudError> {
        if originator.version == 0 {
            return Err(CrudError::InvalidArgument("missing version".to_string()));
        }

        self.validate(entity_type, payload).await?;

        let new_originator = originator.next();

        let (current, _) = self.get(originator, false).await?;
        let current: Value = serde_json::from_str(&current)?;
        let target: Value = serde_json::from_str(payload)
            .map_err(|e| CrudError::InvalidArgument(format!("payload is not valid JSON: {e}")))?;

        let merge_patch = patch::diff(&current, &target);

        let event = Event::new(
            new_originator.clone(),
            format!("{entity_type}.Updated"),
            serde_json::to_string(&merge_patch)?,
        );
        self.estore.append(event).await?;

        Ok(new_originator)
    }

    /// Reconstruct current state by folding the entity's events.
    ///
    /// A zero version folds the whole stream; a non-zero version replays
    /// only up to that version (and fails with `NotFound` when the
    /// version has not been produced yet). Events whose action is not a
    /// CRUD action are ignored by the fold. Returns the payload and the
    /// latest originator seen.
    pub async fn get(
        &self,
        originator: &Originator,
        include_deleted: bool,
    ) -> Result<(String, Originator), CrudError> {
        let events = self.estore.get(originator, false).await?;

        if events.is_empty() {
            return Err(CrudError::NotFound);
        }

        let latest = events.last().expect("non-empty");
        if is_tombstone(latest) && !include_deleted {
            return Err(CrudError::Deleted);
        }

        if originator.version != 0 && originator.version as usize > events.len() {
            return Err(CrudError::NotFound);
        }

        let mut state: Value = serde_json::from_str(&events[0].payload)?;
        let mut latest_originator = events[0].originator.clone();

        for event in &events[1..] {
            latest_originator = event.originator.clone();

            if !is_crud_event(event) || is_tombstone(event) {
                continue;
            }

            let merge_patch: Value = serde_json::from_str(&event.payload)?;
            json_patch::merge(&mut state, &merge_patch);
        }

        Ok((serde_json::to_string(&state)?, latest_originator))
    }

    /// Emit a `<entityType>.Deleted` tombstone with payload `{}` one
    /// version past the latest. Re-deleting fails with `Deleted`.
    pub async fn delete(
        &self,
        entity_type: &str,
        originator: &Originator,
    ) -> Result<Originator, CrudError> {
        let (_, latest) = self.get(originator, false).await?;
        let new_originator = latest.next();

        let event = Event::new(
            new_originator.clone(),
            format!("{entity_type}.Deleted"),
            "{}",
        );
        self.estore.append(event).await?;

        Ok(new_originator)
    }

    /// Page through the live originators of one entity type in global
    /// log order.
    ///
    /// The scan walks `size * 20` log entries of the partition starting
    /// at `from_id`; an id enters the page at its first non-tombstone
    /// appearance and a later tombstone in the same page removes it (a
    /// short page is accepted — resurrection is not supported). Returns
    /// the page and the next cursor (last scanned log id + 1), or `None`
    /// when nothing was scanned.
    pub async fn list(
        &self,
        entity_type: &str,
        from_id: u64,
        size: usize,
    ) -> Result<(Vec<Originator>, Option<u64>), CrudError> {
        if entity_type.is_empty() {
            return Err(CrudError::InvalidArgument("missing entity type".to_string()));
        }

        let size = if size == 0 { DEFAULT_LIST_SIZE } else { size };
        let scan_size = (size * LIST_SCAN_MULTIPLIER) as u32;

        let entries = self
            .estore
            .logs(from_id, scan_size, Some(entity_type))
            .await?;

        if entries.is_empty() {
            return Ok((Vec::new(), None));
        }

        let mut live: HashSet<String> = HashSet::new();
        let mut first_seen: Vec<String> = Vec::new();
        let mut last_scanned = 0;

        for entry in &entries {
            let id = &entry.event.originator.id;
            if live.contains(id) {
                if is_tombstone(&entry.event) {
                    live.remove(id);
                }
            } else if !is_tombstone(&entry.event) {
                live.insert(id.clone());
                first_seen.push(id.clone());
            }

            last_scanned = entry.id;
            if live.len() >= size {
                break;
            }
        }

        let results = first_seen
            .into_iter()
            .filter(|id| live.contains(id))
            .map(Originator::latest)
            .collect();

        Ok((results, Some(last_scanned + 1)))
    }

    async fn validate(&self, entity_type: &str, payload: &str) -> Result<(), CrudError> {
        let Some(registry) = &self.registry else {
            return Ok(());
        };

        registry
            .validate(entity_type, payload)
            .await
            .map_err(|e| match e {
                crate::registry::RegistryError::Crud(inner) => inner,
                other => CrudError::InvalidArgument(other.to_string()),
            })
    }
}

/// Whether the action suffix is `deleted` (case-insensitive)
fn is_tombstone(event: &Event) -> bool {
    event.action().eq_ignore_ascii_case("deleted")
}

/// Whether the action suffix carries CRUD meaning at all; anything else
/// is a domain event that passes through the store but not the fold
fn is_crud_event(event: &Event) -> bool {
    let action = event.action();
    action.eq_ignore_ascii_case("created")
        || action.eq_ignore_ascii_case("updated")
        || action.eq_ignore_ascii_case("deleted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryStore;

    fn engine() -> CrudStore {
        CrudStore::new(Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let crud = engine();
        let originator = Originator::generate();

        let created = crud
            .create("User", &originator, r#"{"name":"a"}"#)
            .await
            .unwrap();
        assert_eq!(created.version, 1);

        let (payload, latest) = crud.get(&Originator::latest(&originator.id), false).await.unwrap();
        assert_eq!(payload, r#"{"name":"a"}"#);
        assert_eq!(latest.version, 1);
    }

    #[tokio::test]
    async fn test_create_promotes_zero_version() {
        let crud = engine();
        let originator = Originator::latest("fixed-id");

        let created = crud.create("User", &originator, "{}").await.unwrap();
        assert_eq!(created.version, 1);
    }

    #[tokio::test]
    async fn test_create_existing_id_is_duplicate() {
        let crud = engine();
        let originator = Originator::generate();

        crud.create("User", &originator, "{}").await.unwrap();
        let err = crud.create("User", &originator, "{}").await.unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_update_folds_merge_patches() {
        let crud = engine();
        let originator = Originator::generate();

        crud.create("User", &originator, r#"{"name":"a","age":30}"#)
            .await
            .unwrap();
        let v2 = crud
            .update("User", &originator, r#"{"name":"b","age":30}"#)
            .await
            .unwrap();
        assert_eq!(v2.version, 2);

        let (payload, latest) = crud.get(&Originator::latest(&originator.id), false).await.unwrap();
        let state: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(state, serde_json::json!({"name": "b", "age": 30}));
        assert_eq!(latest.version, 2);

        // replay at version 1 yields the original state
        let (payload, _) = crud.get(&Originator::new(&originator.id, 1), false).await.unwrap();
        let state: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(state, serde_json::json!({"name": "a", "age": 30}));
    }

    #[tokio::test]
    async fn test_update_requires_version() {
        let crud = engine();
        let err = crud
            .update("User", &Originator::latest("u1"), "{}")
            .await
            .unwrap_err();
        assert!(matches!(err, CrudError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_update_missing_entity_is_not_found() {
        let crud = engine();
        let err = crud
            .update("User", &Originator::new("ghost", 1), "{}")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_update_is_duplicate() {
        let crud = engine();
        let originator = Originator::generate();

        crud.create("User", &originator, r#"{"n":1}"#).await.unwrap();
        crud.update("User", &originator, r#"{"n":2}"#).await.unwrap();

        // second writer still holds version 1
        let err = crud
            .update("User", &originator, r#"{"n":3}"#)
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_delete_semantics() {
        let crud = engine();
        let originator = Originator::generate();

        crud.create("User", &originator, r#"{"name":"b"}"#).await.unwrap();
        let tombstone = crud.delete("User", &originator).await.unwrap();
        assert_eq!(tombstone.version, 2);

        let err = crud
            .get(&Originator::latest(&originator.id), false)
            .await
            .unwrap_err();
        assert!(err.is_deleted());

        // last pre-deletion state is still reachable
        let (payload, _) = crud
            .get(&Originator::latest(&originator.id), true)
            .await
            .unwrap();
        assert_eq!(payload, r#"{"name":"b"}"#);

        // re-deleting a tombstoned entity fails
        let err = crud.delete("User", &originator).await.unwrap_err();
        assert!(err.is_deleted());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let crud = engine();
        let err = crud.get(&Originator::latest("ghost"), false).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_future_version_is_not_found() {
        let crud = engine();
        let originator = Originator::generate();
        crud.create("User", &originator, "{}").await.unwrap();

        let err = crud
            .get(&Originator::new(&originator.id, 5), false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_domain_events_are_ignored_by_fold() {
        let estore: Arc<dyn EventStore> = Arc::new(InMemoryStore::new());
        let crud = CrudStore::new(estore.clone());
        let originator = Originator::generate();

        crud.create("User", &originator, r#"{"name":"a"}"#).await.unwrap();
        estore
            .append(Event::new(
                Originator::new(&originator.id, 2),
                "User.LoggedIn",
                r#"{"ip":"10.0.0.1"}"#,
            ))
            .await
            .unwrap();

        let (payload, latest) = crud.get(&Originator::latest(&originator.id), false).await.unwrap();
        assert_eq!(payload, r#"{"name":"a"}"#);
        // the fold skips the domain event but still reports its version
        assert_eq!(latest.version, 2);
    }

    #[tokio::test]
    async fn test_list_pagination_and_tombstones() {
        let crud = engine();

        let mut ids = Vec::new();
        for i in 0..5 {
            let originator = Originator::generate();
            crud.create("User", &originator, &format!(r#"{{"n":{i}}}"#))
                .await
                .unwrap();
            ids.push(originator);
        }
        crud.delete("User", &ids[2]).await.unwrap();

        let (page, _) = crud.list("User", 0, 10).await.unwrap();
        let page_ids: Vec<&str> = page.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(
            page_ids,
            vec![
                ids[0].id.as_str(),
                ids[1].id.as_str(),
                ids[3].id.as_str(),
                ids[4].id.as_str()
            ]
        );

        // a page of two plus a cursor that picks up the remainder
        let (page, cursor) = crud.list("User", 0, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, ids[0].id);
        assert_eq!(page[1].id, ids[1].id);

        let (rest, _) = crud.list("User", cursor.unwrap(), 10).await.unwrap();
        let rest_ids: Vec<&str> = rest.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(rest_ids, vec![ids[3].id.as_str(), ids[4].id.as_str()]);
    }

    #[tokio::test]
    async fn test_list_empty_partition() {
        let crud = engine();
        let (page, cursor) = crud.list("Nothing", 0, 10).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(cursor, None);
    }

    #[tokio::test]
    async fn test_list_is_partitioned_by_entity_type() {
        let crud = engine();

        let user = Originator::generate();
        crud.create("User", &user, "{}").await.unwrap();
        let order = Originator::generate();
        crud.create("Order", &order, "{}").await.unwrap();

        let (page, _) = crud.list("User", 0, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, user.id);
    }
}
