//! Staff views over placed orders and open carts.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Cart, Order, Product, User};

/// Order together with the customer who placed it
#[derive(Debug, Clone)]
pub struct CustomerOrder {
    pub order: Order,
    pub customer: Option<User>,
}

/// Cart with its customer and current lines
#[derive(Debug, Clone)]
pub struct CustomerCart {
    pub cart: Cart,
    pub customer: Option<User>,
    pub products: Vec<Product>,
}

/// Blank search terms mean "everything"
pub fn search_term(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Every order matching the search, newest first
pub async fn search_orders(store: &dyn Store, search: Option<&str>) -> Result<Vec<CustomerOrder>> {
    let orders = store.search_orders(search_term(search)).await?;

    let mut rows = Vec::with_capacity(orders.len());
    for order in orders {
        let customer = store.find_user(order.customer_id).await?;
        rows.push(CustomerOrder { order, customer });
    }
    Ok(rows)
}

/// Any order by id, regardless of owner
pub async fn order_by_id(store: &dyn Store, id: i64) -> Result<CustomerOrder> {
    let order = store.find_order(id).await?.ok_or(AppError::NotFound)?;
    let customer = store.find_user(order.customer_id).await?;
    Ok(CustomerOrder { order, customer })
}

/// Every cart with its lines, newest first
pub async fn open_carts(store: &dyn Store) -> Result<Vec<CustomerCart>> {
    let carts = store.all_carts().await?;

    let mut rows = Vec::with_capacity(carts.len());
    for cart in carts {
        let customer = store.find_user(cart.customer_id).await?;
        let products = store.cart_products(cart.id).await?;
        rows.push(CustomerCart {
            cart,
            customer,
            products,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::shop::test_support::{place_order, seed_product, seed_user};
    use rust_decimal_macros::dec;

    #[test]
    fn test_search_term() {
        assert_eq!(search_term(Some("  ann ")), Some("ann"));
        assert_eq!(search_term(Some("   ")), None);
        assert_eq!(search_term(None), None);
    }

    #[tokio::test]
    async fn test_search_orders_by_customer_and_cost() {
        let store = MemoryStore::new();
        let ann = seed_user(&store, "ann@example.com").await;
        let bob = seed_user(&store, "bob@example.com").await;
        let first = place_order(&store, &ann).await;
        let second = place_order(&store, &bob).await;

        let all = search_orders(&store, None).await.unwrap();
        let ids: Vec<i64> = all.iter().map(|r| r.order.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let by_email = search_orders(&store, Some("ANN@")).await.unwrap();
        assert_eq!(by_email.len(), 1);
        assert_eq!(by_email[0].order.id, first.id);
        assert_eq!(by_email[0].customer.as_ref().unwrap().email, "ann@example.com");

        let by_cost = search_orders(&store, Some("10.00")).await.unwrap();
        assert_eq!(by_cost.len(), 2);

        assert!(search_orders(&store, Some("nobody")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_by_id_ignores_owner() {
        let store = MemoryStore::new();
        let ann = seed_user(&store, "ann@example.com").await;
        let order = place_order(&store, &ann).await;

        let row = order_by_id(&store, order.id).await.unwrap();
        assert_eq!(row.order.cost, dec!(10.00));
        assert_eq!(row.customer.unwrap().id, ann.id);

        let err = order_by_id(&store, order.id + 100).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn test_open_carts_lists_lines() {
        let store = MemoryStore::new();
        let ann = seed_user(&store, "ann@example.com").await;
        let rust = seed_product(&store, "rust", dec!(10.00)).await;
        let go = seed_product(&store, "go", dec!(15.00)).await;
        store.add_to_cart(ann.id, rust.id).await.unwrap();
        store.add_to_cart(ann.id, go.id).await.unwrap();

        let carts = open_carts(&store).await.unwrap();
        assert_eq!(carts.len(), 1);
        let slugs: Vec<&str> = carts[0].products.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["rust", "go"]);

        store.checkout(ann.id, chrono::Utc::now()).await.unwrap();
        assert!(open_carts(&store).await.unwrap().is_empty());
    }
}
