//! Order history models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Line item copied out of the catalog at checkout time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default)]
    pub product_id: Option<i64>,
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub properties: Vec<String>,
}

impl OrderItem {
    /// One-line description, e.g. `Rust basics (rust-basics, in sale), price: 10.00, quantity: 1`
    pub fn summary(&self) -> String {
        if self.properties.is_empty() {
            format!("{}, price: {}, quantity: {}", self.name, self.price, self.quantity)
        } else {
            format!(
                "{} ({}), price: {}, quantity: {}",
                self.name,
                self.properties.join(", "),
                self.price,
                self.quantity
            )
        }
    }
}

/// Immutable purchase record
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub order_date: DateTime<Utc>,
    #[sqlx(json)]
    pub items: Vec<OrderItem>,
    pub payment_date: DateTime<Utc>,
    pub cost: Decimal,
}

impl Order {
    pub fn url(&self) -> String {
        format!("/orders/{}/", self.id)
    }
}

/// Order row about to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer_id: i64,
    pub order_date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub payment_date: DateTime<Utc>,
    pub cost: Decimal,
}

impl NewOrder {
    pub fn into_order(self, id: i64) -> Order {
        Order {
            id,
            customer_id: self.customer_id,
            order_date: self.order_date,
            items: self.items,
            payment_date: self.payment_date,
            cost: self.cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_item_summary() {
        let item = OrderItem {
            product_id: Some(1),
            name: "Rust basics".to_string(),
            price: dec!(10.00),
            quantity: 1,
            properties: vec!["rust-basics".to_string(), "in sale".to_string()],
        };
        assert_eq!(
            item.summary(),
            "Rust basics (rust-basics, in sale), price: 10.00, quantity: 1"
        );
    }

    #[test]
    fn test_item_json_keeps_price_as_string() {
        let item = OrderItem {
            product_id: None,
            name: "Go".to_string(),
            price: dec!(15.00),
            quantity: 1,
            properties: vec![],
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["price"], "15.00");

        // Snapshots written before product ids were recorded still load
        let old: OrderItem =
            serde_json::from_str(r#"{"name":"Go","price":"15.00","quantity":1}"#).unwrap();
        assert_eq!(old.product_id, None);
        assert!(old.properties.is_empty());
    }
}
