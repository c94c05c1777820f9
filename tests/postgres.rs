//! Store contract checks against a live Postgres database.
//!
//! These run only when `DATABASE_URL` points at Postgres and return early
//! otherwise. Names are randomised so runs can share one database.

use std::time::Duration;

use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use courseshop_web::{
    db::{PgStore, Store},
    error::AppError,
    models::{NewProduct, NewSlot, NewUser, Product, User},
};

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with("postgres"))
}

async fn pg_store(url: &str) -> PgStore {
    let store = PgStore::connect(url, 5).await.unwrap();
    store.migrate().await.unwrap();
    store
}

fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

async fn seed_user(store: &PgStore) -> User {
    store
        .create_user(NewUser {
            email: format!("{}@example.com", unique("user")),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            password_hash: String::new(),
            is_staff: false,
        })
        .await
        .unwrap()
}

async fn seed_product(store: &PgStore, price: Decimal) -> Product {
    let slug = unique("course");
    store
        .create_product(NewProduct {
            name: format!("Course {}", slug),
            slug,
            description: String::new(),
            price,
            in_sale: true,
        })
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_users_race_for_one_slot() {
    let Some(url) = database_url() else { return };
    let store = pg_store(&url).await;
    let today = Utc::now().date_naive();
    let slot = store
        .create_slot(NewSlot {
            date: today + chrono::Duration::days(1),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        })
        .await
        .unwrap();
    let first = seed_user(&store).await;
    let second = seed_user(&store).await;

    let (a, b) = tokio::join!(
        store.claim_slot(slot.id, first.id, today),
        store.claim_slot(slot.id, second.id, today),
    );
    let winners = [a.unwrap(), b.unwrap()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    assert_eq!(winners.len(), 1);
    assert!(winners[0].assigned_to == Some(first.id) || winners[0].assigned_to == Some(second.id));
    assert!(store.find_open_slot(slot.id, today).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_to_cart_is_idempotent() {
    let Some(url) = database_url() else { return };
    let store = pg_store(&url).await;
    let user = seed_user(&store).await;
    let product = seed_product(&store, dec!(10.00)).await;

    let first = store.add_to_cart(user.id, product.id).await.unwrap();
    let again = store.add_to_cart(user.id, product.id).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(store.cart_products(first.id).await.unwrap().len(), 1);

    let err = store.add_to_cart(user.id, -1).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_removing_last_line_deletes_cart() {
    let Some(url) = database_url() else { return };
    let store = pg_store(&url).await;
    let user = seed_user(&store).await;
    let rust = seed_product(&store, dec!(10.00)).await;
    let go = seed_product(&store, dec!(15.00)).await;

    store.add_to_cart(user.id, rust.id).await.unwrap();
    store.add_to_cart(user.id, go.id).await.unwrap();

    let left = store.remove_from_cart(user.id, rust.id).await.unwrap();
    assert!(left.is_some());
    let gone = store.remove_from_cart(user.id, go.id).await.unwrap();
    assert!(gone.is_none());
    assert!(store.find_cart(user.id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_checkout_snapshot_survives_round_trip() {
    let Some(url) = database_url() else { return };
    let store = pg_store(&url).await;
    let user = seed_user(&store).await;
    let rust = seed_product(&store, dec!(10.00)).await;
    let go = seed_product(&store, dec!(15.00)).await;
    store.add_to_cart(user.id, rust.id).await.unwrap();
    store.add_to_cart(user.id, go.id).await.unwrap();

    let order = store.checkout(user.id, Utc::now()).await.unwrap().unwrap();
    assert_eq!(order.cost, dec!(25.00));
    assert_eq!(order.items.len(), 2);
    assert!(store.find_cart(user.id).await.unwrap().is_none());

    // Catalog changes do not reach the stored snapshot
    store.set_product_price(rust.id, dec!(99.00)).await.unwrap();
    let stored = store.find_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.items, order.items);
    assert_eq!(stored.items[0].price, dec!(10.00));
    assert_eq!(
        stored.items[0].properties,
        vec![rust.slug.clone(), "in sale".to_string()]
    );

    assert!(store.checkout(user.id, Utc::now()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_duplicates_are_conflicts() {
    let Some(url) = database_url() else { return };
    let store = pg_store(&url).await;
    let user = seed_user(&store).await;
    let product = seed_product(&store, dec!(10.00)).await;
    store.add_to_cart(user.id, product.id).await.unwrap();
    let order = store.checkout(user.id, Utc::now()).await.unwrap().unwrap();

    store.create_dispute(order.id, "video missing").await.unwrap();
    let err = store.create_dispute(order.id, "still missing").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = store
        .create_user(NewUser {
            email: user.email.clone(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: String::new(),
            is_staff: false,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_add_to_cart_during_checkout_starts_new_cart() {
    let Some(url) = database_url() else { return };
    let store = pg_store(&url).await;
    let pool = PgPool::connect(&url).await.unwrap();
    let user = seed_user(&store).await;
    let rust = seed_product(&store, dec!(10.00)).await;
    let go = seed_product(&store, dec!(15.00)).await;
    store.add_to_cart(user.id, rust.id).await.unwrap();

    // Hold the cart the way checkout does
    let mut checkout = pool.begin().await.unwrap();
    sqlx::query("SELECT id FROM carts WHERE customer_id = $1 FOR UPDATE")
        .bind(user.id)
        .fetch_one(&mut *checkout)
        .await
        .unwrap();

    let adding = {
        let store = store.clone();
        let (user_id, product_id) = (user.id, go.id);
        tokio::spawn(async move { store.add_to_cart(user_id, product_id).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    sqlx::query("DELETE FROM carts WHERE customer_id = $1")
        .bind(user.id)
        .execute(&mut *checkout)
        .await
        .unwrap();
    checkout.commit().await.unwrap();

    let cart = adding.await.unwrap().unwrap();
    let slugs: Vec<String> = store
        .cart_products(cart.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.slug)
        .collect();
    assert_eq!(slugs, vec![go.slug]);
}
