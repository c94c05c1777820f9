//! Shopping cart models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A customer's unpaid selection; at most one per customer and never empty
#[derive(Debug, Clone, FromRow)]
pub struct Cart {
    pub id: i64,
    pub customer_id: i64,
    pub start_date: DateTime<Utc>,
}
