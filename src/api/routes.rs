//! API Routes
//!
//! HTTP endpoint definitions. The router is a thin JSON veneer over the
//! event store, the CRUD engine, the schema registry and the consumer
//! checkpoints; all semantics live in the library.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consumer_store::{Checkpoint, ConsumerStore};
use crate::crud::CrudStore;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::registry::SchemaRegistry;
use crate::types::{AppLogEntry, CrudEntitySpec, Event, Originator};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub estore: Arc<dyn EventStore>,
    pub crud: CrudStore,
    pub registry: Arc<SchemaRegistry>,
    pub checkpoints: Arc<dyn ConsumerStore>,
}

impl AppState {
    /// Wire the full stack over a pair of backends. CRUD writes validate
    /// against the schema registry.
    pub fn new(estore: Arc<dyn EventStore>, checkpoints: Arc<dyn ConsumerStore>) -> Self {
        let registry = Arc::new(SchemaRegistry::new(Arc::clone(&estore)));
        let crud = CrudStore::with_registry(Arc::clone(&estore), Arc::clone(&registry));

        Self {
            estore,
            crud,
            registry,
            checkpoints,
        }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct AppendEventRequest {
    pub originator: Originator,
    pub event_type: String,
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub from_version: bool,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub from_id: u64,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub partition: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub entries: Vec<AppLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct PartitionsResponse {
    pub partitions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    #[serde(default)]
    pub originator: Option<Originator>,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntityRequest {
    pub version: u64,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct OriginatorResponse {
    pub originator: Originator,
}

#[derive(Debug, Deserialize)]
pub struct GetEntityQuery {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct EntityResponse {
    pub originator: Originator,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub from_id: u64,
    #[serde(default)]
    pub size: usize,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub originators: Vec<Originator>,
    pub next_page_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterTypeRequest {
    pub spec: CrudEntitySpec,
    #[serde(default)]
    pub skip_duplicate: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTypeRequest {
    pub spec: CrudEntitySpec,
}

#[derive(Debug, Serialize)]
pub struct TypeResponse {
    pub spec: CrudEntitySpec,
}

#[derive(Debug, Deserialize)]
pub struct ListTypesQuery {
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct ListTypesResponse {
    pub results: Vec<CrudEntitySpec>,
}

#[derive(Debug, Deserialize)]
pub struct SaveCheckpointRequest {
    pub offset: u64,
}

#[derive(Debug, Serialize)]
pub struct CheckpointsResponse {
    pub consumers: Vec<Checkpoint>,
}

// =========================================================================
// Event store handlers
// =========================================================================

async fn append_event(
    State(state): State<AppState>,
    Json(req): Json<AppendEventRequest>,
) -> AppResult<StatusCode> {
    let event = Event::new(req.originator, req.event_type, req.payload);
    state.estore.append(event).await?;
    Ok(StatusCode::CREATED)
}

async fn get_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> AppResult<Json<EventsResponse>> {
    let originator = Originator::new(id, query.version);
    let events = state.estore.get(&originator, query.from_version).await?;
    Ok(Json(EventsResponse { events }))
}

async fn get_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> AppResult<Json<LogsResponse>> {
    let entries = state
        .estore
        .logs(query.from_id, query.size, query.partition.as_deref())
        .await?;
    Ok(Json(LogsResponse { entries }))
}

async fn get_partitions(State(state): State<AppState>) -> AppResult<Json<PartitionsResponse>> {
    let partitions = state.estore.partitions().await?;
    Ok(Json(PartitionsResponse { partitions }))
}

// =========================================================================
// CRUD handlers
// =========================================================================

async fn create_entity(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Json(req): Json<CreateEntityRequest>,
) -> AppResult<(StatusCode, Json<OriginatorResponse>)> {
    let originator = req.originator.unwrap_or_else(Originator::generate);
    let payload = serde_json::to_string(&req.payload)
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let originator = state.crud.create(&entity_type, &originator, &payload).await?;
    Ok((StatusCode::CREATED, Json(OriginatorResponse { originator })))
}

async fn update_entity(
    State(state): State<AppState>,
    Path((entity_type, id)): Path<(String, String)>,
    Json(req): Json<UpdateEntityRequest>,
) -> AppResult<Json<OriginatorResponse>> {
    let originator = Originator::new(id, req.version);
    let payload = serde_json::to_string(&req.payload)
        .map_err(|e| AppError::InvalidRequest(e.to_string()))?;

    let originator = state.crud.update(&entity_type, &originator, &payload).await?;
    Ok(Json(OriginatorResponse { originator }))
}

async fn get_entity(
    State(state): State<AppState>,
    Path((_entity_type, id)): Path<(String, String)>,
    Query(query): Query<GetEntityQuery>,
) -> AppResult<Json<EntityResponse>> {
    let originator = Originator::new(id, query.version);
    let (payload, originator) = state.crud.get(&originator, query.deleted).await?;

    let payload: Value =
        serde_json::from_str(&payload).map_err(|e| AppError::Crud(e.into()))?;
    Ok(Json(EntityResponse {
        originator,
        payload,
    }))
}

async fn delete_entity(
    State(state): State<AppState>,
    Path((entity_type, id)): Path<(String, String)>,
) -> AppResult<Json<OriginatorResponse>> {
    let originator = state
        .crud
        .delete(&entity_type, &Originator::latest(id))
        .await?;
    Ok(Json(OriginatorResponse { originator }))
}

async fn list_entities(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let (originators, next_page_id) = state
        .crud
        .list(&entity_type, query.from_id, query.size)
        .await?;
    Ok(Json(ListResponse {
        originators,
        next_page_id,
    }))
}

// =========================================================================
// Schema registry handlers
// =========================================================================

async fn register_type(
    State(state): State<AppState>,
    Json(req): Json<RegisterTypeRequest>,
) -> AppResult<StatusCode> {
    state
        .registry
        .register_type(&req.spec, req.skip_duplicate)
        .await?;
    Ok(StatusCode::CREATED)
}

async fn update_type(
    State(state): State<AppState>,
    Json(req): Json<UpdateTypeRequest>,
) -> AppResult<StatusCode> {
    state.registry.update_type(&req.spec).await?;
    Ok(StatusCode::OK)
}

async fn get_type(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
) -> AppResult<Json<TypeResponse>> {
    let spec = state.registry.get_type(&entity_type).await?;
    Ok(Json(TypeResponse { spec }))
}

async fn list_types(
    State(state): State<AppState>,
    Query(query): Query<ListTypesQuery>,
) -> AppResult<Json<ListTypesResponse>> {
    let results = state.registry.list_types(query.limit).await?;
    Ok(Json(ListTypesResponse { results }))
}

// =========================================================================
// Consumer checkpoint handlers
// =========================================================================

async fn save_checkpoint(
    State(state): State<AppState>,
    Path(consumer_id): Path<String>,
    Json(req): Json<SaveCheckpointRequest>,
) -> AppResult<StatusCode> {
    state
        .checkpoints
        .log_consume(Checkpoint {
            consumer_id,
            offset: req.offset,
        })
        .await?;
    Ok(StatusCode::OK)
}

async fn get_checkpoint(
    State(state): State<AppState>,
    Path(consumer_id): Path<String>,
) -> AppResult<Json<Checkpoint>> {
    let checkpoint = state.checkpoints.get_log_consume(&consumer_id).await?;
    Ok(Json(checkpoint))
}

async fn list_checkpoints(
    State(state): State<AppState>,
) -> AppResult<Json<CheckpointsResponse>> {
    let consumers = state.checkpoints.list().await?;
    Ok(Json(CheckpointsResponse { consumers }))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/events", post(append_event))
        .route("/api/v1/streams/:id", get(get_stream))
        .route("/api/v1/logs", get(get_logs))
        .route("/api/v1/partitions", get(get_partitions))
        .route("/api/v1/crud/:entity_type", post(create_entity).get(list_entities))
        .route(
            "/api/v1/crud/:entity_type/:id",
            get(get_entity).put(update_entity).delete(delete_entity),
        )
        .route("/api/v1/types", post(register_type).put(update_type).get(list_types))
        .route("/api/v1/types/:entity_type", get(get_type))
        .route(
            "/api/v1/consumers/:id",
            put(save_checkpoint).get(get_checkpoint),
        )
        .route("/api/v1/consumers", get(list_checkpoints))
        .with_state(state)
}
