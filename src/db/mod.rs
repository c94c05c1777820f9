//! Persistence layer
//!
//! Handlers and services only see the [`Store`] trait. [`PgStore`] is the
//! production implementation; [`MemoryStore`] keeps the same guarantees in
//! process and backs the test suite.

pub mod memory;
pub mod queries;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{
    Cart, Dispute, DisputeChoice, NewProduct, NewSlot, NewUser, Order, Product, Schedule, User,
};

pub use memory::MemoryStore;
pub use queries::PgStore;

/// Storage operations used by the storefront.
///
/// Every method is a single consistent unit: implementations run the
/// multi-step ones (cart edits, checkout, booking) atomically.
#[async_trait]
pub trait Store: Send + Sync {
    // Accounts

    /// Fails with `Conflict` when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn find_user(&self, id: i64) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn set_staff(&self, id: i64, is_staff: bool) -> Result<()>;

    // Catalog

    /// In-sale products ordered by id
    async fn products_in_sale(&self, limit: i64, offset: i64) -> Result<Vec<Product>>;
    async fn count_products_in_sale(&self) -> Result<i64>;
    async fn all_products(&self) -> Result<Vec<Product>>;
    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>>;
    /// Fails with `Conflict` when the slug is taken
    async fn create_product(&self, product: NewProduct) -> Result<Product>;
    async fn set_product_price(&self, id: i64, price: Decimal) -> Result<()>;
    /// Returns how many products were changed
    async fn set_in_sale(&self, ids: &[i64], in_sale: bool) -> Result<u64>;
    async fn set_product_image(&self, id: i64, image: &str) -> Result<()>;
    /// Removes the product, its cart lines and any cart left empty
    async fn delete_product(&self, id: i64) -> Result<()>;

    // Cart

    async fn find_cart(&self, customer_id: i64) -> Result<Option<Cart>>;
    /// Every cart, newest first
    async fn all_carts(&self) -> Result<Vec<Cart>>;
    /// Products currently in the cart, ordered by when they were added
    async fn cart_products(&self, cart_id: i64) -> Result<Vec<Product>>;
    /// Get-or-create the cart and the line; re-adding is a no-op
    async fn add_to_cart(&self, customer_id: i64, product_id: i64) -> Result<Cart>;
    /// Drops the line if present and deletes the cart once empty.
    /// Returns the cart if it still exists.
    async fn remove_from_cart(&self, customer_id: i64, product_id: i64) -> Result<Option<Cart>>;
    /// Turns the customer's cart into an order and deletes the cart.
    /// `None` when there is nothing to buy.
    async fn checkout(&self, customer_id: i64, payment_date: DateTime<Utc>) -> Result<Option<Order>>;

    // Orders

    /// Newest first
    async fn orders_for(&self, customer_id: i64) -> Result<Vec<Order>>;
    async fn find_order(&self, id: i64) -> Result<Option<Order>>;
    /// Every order, newest first. A search term matches the exact cost or,
    /// case-insensitively, part of the customer's email or names.
    async fn search_orders(&self, search: Option<&str>) -> Result<Vec<Order>>;

    // Disputes

    async fn dispute_choices(&self) -> Result<Vec<DisputeChoice>>;
    /// Fails with `Conflict` when the name is taken
    async fn create_dispute_choice(&self, choice: &str) -> Result<DisputeChoice>;
    /// Fails with `Conflict` when the order already has a dispute
    async fn create_dispute(&self, order_id: i64, text: &str) -> Result<Dispute>;
    async fn find_dispute(&self, id: i64) -> Result<Option<Dispute>>;
    async fn find_dispute_for_order(&self, order_id: i64) -> Result<Option<Dispute>>;
    /// Oldest first
    async fn disputes_for(&self, customer_id: i64, limit: i64, offset: i64) -> Result<Vec<Dispute>>;
    async fn count_disputes_for(&self, customer_id: i64) -> Result<i64>;
    async fn all_disputes(&self, decision_id: Option<i64>) -> Result<Vec<Dispute>>;
    async fn update_dispute_decision(
        &self,
        id: i64,
        decision_id: Option<i64>,
        decision_text: Option<String>,
        decision_date: Option<DateTime<Utc>>,
    ) -> Result<Dispute>;

    // Schedule

    async fn create_slot(&self, slot: NewSlot) -> Result<Schedule>;
    /// Every slot, newest first
    async fn all_slots(&self) -> Result<Vec<Schedule>>;
    /// Unassigned slots dated `today` or later, earliest first
    async fn open_slots(&self, today: NaiveDate) -> Result<Vec<Schedule>>;
    async fn bookings_for(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Schedule>>;
    async fn find_open_slot(&self, id: i64, today: NaiveDate) -> Result<Option<Schedule>>;
    /// Assigns the slot only if it is still open; the check and the write are one step
    async fn claim_slot(&self, id: i64, user_id: i64, today: NaiveDate) -> Result<Option<Schedule>>;
}

/// Open the store selected by the configuration
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn Store>> {
    if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database_url, config.db_max_connections).await?;
    store.migrate().await?;
    Ok(Arc::new(store))
}
