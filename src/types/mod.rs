//! Core data model
//!
//! The wire-level types shared by the event store, the CRUD engine and the
//! log consumers. Everything here is plain data with serde round-trips.

mod applog;
mod event;
mod originator;
mod spec;

pub use applog::AppLogEntry;
pub use event::Event;
pub use originator::Originator;
pub use spec::{CrudEntitySpec, SchemaSpec};
