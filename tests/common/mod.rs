//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use eskit::api::AppState;
use eskit::consumer_store::InMemoryConsumerStore;
use eskit::event_store::InMemoryStore;
use eskit::registry::SchemaRegistry;
use eskit::{ConsumerStore, CrudStore, EventStore};

/// Everything the suites need, wired over in-memory backends so the
/// tests run hermetically.
pub struct Fixtures {
    pub estore: Arc<dyn EventStore>,
    pub checkpoints: Arc<dyn ConsumerStore>,
    pub registry: Arc<SchemaRegistry>,
    pub crud: CrudStore,
}

pub fn setup() -> Fixtures {
    let estore: Arc<dyn EventStore> = Arc::new(InMemoryStore::new());
    let checkpoints: Arc<dyn ConsumerStore> = Arc::new(InMemoryConsumerStore::new());
    let registry = Arc::new(SchemaRegistry::new(Arc::clone(&estore)));
    let crud = CrudStore::with_registry(Arc::clone(&estore), Arc::clone(&registry));

    Fixtures {
        estore,
        checkpoints,
        registry,
        crud,
    }
}

/// App state over fresh in-memory backends, for router tests
pub fn setup_state() -> AppState {
    AppState::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryConsumerStore::new()),
    )
}
