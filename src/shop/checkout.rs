//! Checkout: turns a cart into an immutable order.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Cart, NewOrder, Order, OrderItem, Product, User};

use super::pricing::cart_total;

/// Copy one catalog product into an order line.
///
/// The copy is what the order keeps; later catalog edits never reach it.
pub fn snapshot_item(product: &Product) -> OrderItem {
    let sale_status = if product.in_sale { "in sale" } else { "not in sale" };
    OrderItem {
        product_id: Some(product.id),
        name: product.name.clone(),
        price: product.price,
        quantity: 1,
        properties: vec![product.slug.clone(), sale_status.to_string()],
    }
}

/// Build the order for a cart from the products' current prices.
///
/// The order date is the day shopping started (the cart's creation),
/// the payment date is the moment of checkout.
pub fn snapshot_order(cart: &Cart, products: &[Product], payment_date: DateTime<Utc>) -> NewOrder {
    NewOrder {
        customer_id: cart.customer_id,
        order_date: cart.start_date,
        items: products.iter().map(snapshot_item).collect(),
        payment_date,
        cost: cart_total(products),
    }
}

/// Pay for the user's cart. Fails with `NotFound` when there is no cart.
pub async fn checkout(store: &dyn Store, user: &User) -> Result<Order> {
    let order = store
        .checkout(user.id, Utc::now())
        .await?
        .ok_or(AppError::NotFound)?;

    info!(
        user_id = user.id,
        order_id = order.id,
        cost = %order.cost,
        items = order.items.len(),
        "Order placed"
    );
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::shop::test_support::{seed_product, seed_user};
    use crate::shop::{cart, catalog};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_checkout_totals_and_clears_cart() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@b.com").await;
        seed_product(&store, "rust", dec!(10.00)).await;
        seed_product(&store, "go", dec!(15.00)).await;

        cart::add_to_cart(&store, &user, "rust").await.unwrap();
        cart::add_to_cart(&store, &user, "go").await.unwrap();

        let order = checkout(&store, &user).await.unwrap();
        assert_eq!(order.cost, dec!(25.00));
        assert_eq!(order.items.len(), 2);
        assert!(order.items.iter().all(|i| i.quantity == 1));
        assert!(store.find_cart(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkout_without_cart_is_not_found() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@b.com").await;

        let err = checkout(&store, &user).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_checkout_uses_price_at_checkout_not_at_add() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@b.com").await;
        let product = seed_product(&store, "rust", dec!(10.00)).await;

        cart::add_to_cart(&store, &user, "rust").await.unwrap();
        store.set_product_price(product.id, dec!(12.50)).await.unwrap();

        let order = checkout(&store, &user).await.unwrap();
        assert_eq!(order.cost, dec!(12.50));
    }

    #[tokio::test]
    async fn test_order_is_immune_to_catalog_changes() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a@b.com").await;
        let rust = seed_product(&store, "rust", dec!(10.00)).await;
        let go = seed_product(&store, "go", dec!(15.00)).await;

        cart::add_to_cart(&store, &user, "rust").await.unwrap();
        cart::add_to_cart(&store, &user, "go").await.unwrap();
        let order = checkout(&store, &user).await.unwrap();

        store.set_product_price(rust.id, dec!(99.00)).await.unwrap();
        catalog::delete_product(&store, go.id).await.unwrap();

        let stored = store.find_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.cost, dec!(25.00));
        assert_eq!(stored.items, order.items);
        assert_eq!(stored.items[0].price, dec!(10.00));
        assert_eq!(stored.items[1].name, "Course go");
    }

    #[test]
    fn test_snapshot_order_uses_cart_start_date() {
        let start = Utc::now() - chrono::Duration::days(2);
        let cart = Cart {
            id: 1,
            customer_id: 9,
            start_date: start,
        };
        let product = Product {
            id: 3,
            name: "Rust".into(),
            slug: "rust".into(),
            description: String::new(),
            price: dec!(10.00),
            in_sale: true,
            image: None,
        };

        let now = Utc::now();
        let order = snapshot_order(&cart, &[product], now);
        assert_eq!(order.customer_id, 9);
        assert_eq!(order.order_date, start);
        assert_eq!(order.payment_date, now);
        assert_eq!(order.items[0].properties, vec!["rust", "in sale"]);
    }
}
