//! In-memory caching using moka
//!
//! Holds the catalog pages and product details that every visitor reads,
//! plus the session table. Catalog entries are dropped whenever staff change
//! the catalog.

use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::models::Product;
use crate::shop::catalog;
use crate::shop::pagination::Page;

/// One rendered page worth of the in-sale catalog
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub products: Vec<Product>,
    pub page: Page,
}

/// Application cache
#[derive(Clone)]
pub struct AppCache {
    /// Product detail (slug -> Product)
    pub products: Cache<String, Arc<Product>>,
    /// In-sale listing (page number -> page)
    pub catalog_pages: Cache<i64, Arc<CatalogPage>>,
    /// Login sessions (session id -> user id)
    pub sessions: Cache<Uuid, i64>,
}

impl AppCache {
    /// Create a new cache instance with default session idle time (two weeks)
    pub fn new() -> Self {
        Self::with_session_idle(Duration::from_secs(14 * 24 * 60 * 60))
    }

    pub fn with_session_idle(session_idle: Duration) -> Self {
        Self {
            // Product detail: 500 entries, 10 min TTL
            products: Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(10 * 60))
                .build(),

            // Catalog pages: 50 entries, 5 min TTL
            catalog_pages: Cache::builder()
                .max_capacity(50)
                .time_to_live(Duration::from_secs(5 * 60))
                .build(),

            // Sessions expire after a period without requests
            sessions: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(session_idle)
                .build(),
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            products_size: self.products.entry_count(),
            catalog_pages_size: self.catalog_pages.entry_count(),
            sessions_size: self.sessions.entry_count(),
        }
    }

    /// Drop every cached product and listing
    pub fn invalidate_catalog(&self) {
        self.products.invalidate_all();
        self.catalog_pages.invalidate_all();
        info!("Catalog cache invalidated");
    }

    /// Start a session for the user and return its id
    pub async fn open_session(&self, user_id: i64) -> Uuid {
        let session_id = Uuid::new_v4();
        self.sessions.insert(session_id, user_id).await;
        session_id
    }

    pub async fn session_user(&self, session_id: &Uuid) -> Option<i64> {
        self.sessions.get(session_id).await
    }

    pub async fn close_session(&self, session_id: &Uuid) {
        self.sessions.invalidate(session_id).await;
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics for monitoring endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub products_size: u64,
    pub catalog_pages_size: u64,
    pub sessions_size: u64,
}

/// Start background cache warmer
///
/// Warms the cache on startup and refreshes every 10 minutes.
pub async fn start_cache_warmer(cache: AppCache, store: Arc<dyn Store>) {
    let mut interval = interval(Duration::from_secs(10 * 60));
    loop {
        interval.tick().await;
        warm_cache(&cache, store.as_ref()).await;
    }
}

/// Warm the first catalog page, the one every visitor lands on
async fn warm_cache(cache: &AppCache, store: &dyn Store) {
    cache.catalog_pages.invalidate(&1).await;
    match catalog::catalog_page(store, cache, 1).await {
        Ok(page) => info!(products = page.products.len(), "Catalog cache warmed"),
        Err(e) => warn!("Failed to warm catalog cache: {}", e),
    }
    info!("Cache stats: {:?}", cache.stats());
}
