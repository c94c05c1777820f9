//! Catalog models

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Product (course) from the catalog
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub in_sale: bool,
    /// Path relative to the media root
    pub image: Option<String>,
}

impl Product {
    pub fn url(&self) -> String {
        format!("/course/{}/", self.slug)
    }
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub in_sale: bool,
}
