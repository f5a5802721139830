//! API module
//!
//! Thin HTTP surface over the storage toolkit.

pub mod routes;

pub use routes::{create_router, AppState};
