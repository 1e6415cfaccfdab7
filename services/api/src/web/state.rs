//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use school_core::ports::DatabaseService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
///
/// There is no active school year here; each request carries its own
/// (see `require_year_scope`).
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
}
