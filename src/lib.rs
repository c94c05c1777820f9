//! Course shop web application
//!
//! Catalog, cart and checkout, order history with disputes, and a booking
//! schedule, served as server-rendered HTML.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod forms;
pub mod models;
pub mod routes;
pub mod shop;

use std::sync::Arc;

use axum::Router;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use crate::cache::AppCache;
use crate::config::AppConfig;
use crate::db::{MemoryStore, Store};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: AppCache,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self {
            store,
            cache: AppCache::with_session_idle(config.session_idle),
            config: Arc::new(config),
        }
    }

    /// State over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), AppConfig::in_memory())
    }
}

/// Full application router with static file serving and middleware
pub fn app(state: AppState) -> Router {
    let media = ServeDir::new(&state.config.media_root);
    let assets = ServeDir::new(&state.config.static_root);

    routes::router()
        .nest_service("/media", media)
        .nest_service("/static", assets)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
