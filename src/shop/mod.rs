//! Storefront services.
//!
//! Each submodule owns one area of the shop; handlers call into these and
//! never talk to the store directly for writes.

pub mod accounts;
pub mod booking;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod disputes;
pub mod orders;
pub mod pagination;
pub mod pricing;

#[cfg(test)]
pub(crate) mod test_support {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::db::Store;
    use crate::models::{NewProduct, NewUser, Order, Product, User};

    pub async fn seed_user(store: &dyn Store, email: &str) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                password_hash: String::new(),
                is_staff: false,
            })
            .await
            .unwrap()
    }

    pub async fn seed_staff(store: &dyn Store, email: &str) -> User {
        let user = seed_user(store, email).await;
        store.set_staff(user.id, true).await.unwrap();
        store.find_user(user.id).await.unwrap().unwrap()
    }

    pub async fn seed_product(store: &dyn Store, slug: &str, price: Decimal) -> Product {
        store
            .create_product(NewProduct {
                name: format!("Course {}", slug),
                slug: slug.to_string(),
                description: String::new(),
                price,
                in_sale: true,
            })
            .await
            .unwrap()
    }

    /// Buy a freshly created product and return the order
    pub async fn place_order(store: &dyn Store, user: &User) -> Order {
        let slug = format!("course-{}", uuid::Uuid::new_v4().simple());
        let product = seed_product(store, &slug, dec!(10.00)).await;
        store.add_to_cart(user.id, product.id).await.unwrap();
        store
            .checkout(user.id, chrono::Utc::now())
            .await
            .unwrap()
            .unwrap()
    }
}
