//! Postgres-backed store

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{AppError, Result};
use crate::models::{
    Cart, Dispute, DisputeChoice, NewProduct, NewSlot, NewUser, Order, Product, Schedule, User,
};
use crate::shop::checkout::snapshot_order;

use super::Store;

const PRODUCT_COLUMNS: &str = "id, name, slug, description, price, in_sale, image";

const CART_PRODUCTS: &str = r#"
    SELECT p.id, p.name, p.slug, p.description, p.price, p.in_sale, p.image
    FROM cart_contents cc
    JOIN products p ON p.id = cc.product_id
    WHERE cc.cart_id = $1
    ORDER BY cc.id
"#;

const DISPUTE_SELECT: &str = r#"
    SELECT
        d.id,
        d.order_id,
        o.customer_id,
        d.created_at,
        d.dispute_text,
        d.decision_id,
        c.choice AS decision,
        d.decision_text,
        d.decision_date
    FROM disputes d
    JOIN orders o ON o.id = d.order_id
    LEFT JOIN dispute_choices c ON c.id = d.decision_id
"#;

/// Store on a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        tracing::info!("Database connection established");
        Ok(Self { pool })
    }

    /// Apply pending migrations from `migrations/`
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    async fn cart_in(tx: &mut Transaction<'_, Postgres>, customer_id: i64) -> Result<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            SELECT id, customer_id, start_date
            FROM carts
            WHERE customer_id = $1
            FOR UPDATE
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(cart)
    }

    async fn products_in(tx: &mut Transaction<'_, Postgres>, cart_id: i64) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(CART_PRODUCTS)
            .bind(cart_id)
            .fetch_all(&mut **tx)
            .await?;

        Ok(products)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, first_name, last_name, password_hash, is_staff)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, first_name, last_name, password_hash, is_staff, date_joined
            "#,
        )
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "user"))?;

        Ok(created)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, password_hash, is_staff, date_joined
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, first_name, last_name, password_hash, is_staff, date_joined
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn set_staff(&self, id: i64, is_staff: bool) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_staff = $2 WHERE id = $1")
            .bind(id)
            .bind(is_staff)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn products_in_sale(&self, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE in_sale ORDER BY id LIMIT $1 OFFSET $2",
            PRODUCT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn count_products_in_sale(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE in_sale")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY id",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE slug = $1",
            PRODUCT_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let created = sqlx::query_as::<_, Product>(&format!(
            r#"
            INSERT INTO products (name, slug, description, price, in_sale)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&product.name)
        .bind(&product.slug)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.in_sale)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "product"))?;

        Ok(created)
    }

    async fn set_product_price(&self, id: i64, price: Decimal) -> Result<()> {
        let result = sqlx::query("UPDATE products SET price = $2 WHERE id = $1")
            .bind(id)
            .bind(price)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn set_in_sale(&self, ids: &[i64], in_sale: bool) -> Result<u64> {
        let result = sqlx::query("UPDATE products SET in_sale = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(in_sale)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn set_product_image(&self, id: i64, image: &str) -> Result<()> {
        let result = sqlx::query("UPDATE products SET image = $2 WHERE id = $1")
            .bind(id)
            .bind(image)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn delete_product(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Cart lines go with the product (ON DELETE CASCADE)
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            DELETE FROM carts c
            WHERE NOT EXISTS (SELECT 1 FROM cart_contents cc WHERE cc.cart_id = c.id)
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_cart(&self, customer_id: i64) -> Result<Option<Cart>> {
        let cart = sqlx::query_as::<_, Cart>(
            "SELECT id, customer_id, start_date FROM carts WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cart)
    }

    async fn all_carts(&self) -> Result<Vec<Cart>> {
        let carts = sqlx::query_as::<_, Cart>(
            "SELECT id, customer_id, start_date FROM carts ORDER BY start_date DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(carts)
    }

    async fn cart_products(&self, cart_id: i64) -> Result<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(CART_PRODUCTS)
            .bind(cart_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn add_to_cart(&self, customer_id: i64, product_id: i64) -> Result<Cart> {
        let mut tx = self.pool.begin().await?;

        // The no-op update locks an existing cart and returns it; a cart deleted
        // by a concurrent checkout makes Postgres retry the insert instead
        let cart = sqlx::query_as::<_, Cart>(
            r#"
            INSERT INTO carts (customer_id, start_date)
            VALUES ($1, NOW())
            ON CONFLICT (customer_id) DO UPDATE SET customer_id = EXCLUDED.customer_id
            RETURNING id, customer_id, start_date
            "#,
        )
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO cart_contents (cart_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (cart_id, product_id) DO NOTHING
            "#,
        )
        .bind(cart.id)
        .bind(product_id)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(AppError::NotFound);
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(cart)
    }

    async fn remove_from_cart(&self, customer_id: i64, product_id: i64) -> Result<Option<Cart>> {
        let mut tx = self.pool.begin().await?;

        let Some(cart) = Self::cart_in(&mut tx, customer_id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM cart_contents WHERE cart_id = $1 AND product_id = $2")
            .bind(cart.id)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM carts c
            WHERE c.id = $1
              AND NOT EXISTS (SELECT 1 FROM cart_contents cc WHERE cc.cart_id = c.id)
            "#,
        )
        .bind(cart.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        if deleted.rows_affected() > 0 {
            Ok(None)
        } else {
            Ok(Some(cart))
        }
    }

    async fn checkout(&self, customer_id: i64, payment_date: DateTime<Utc>) -> Result<Option<Order>> {
        let mut tx = self.pool.begin().await?;

        let Some(cart) = Self::cart_in(&mut tx, customer_id).await? else {
            return Ok(None);
        };
        let products = Self::products_in(&mut tx, cart.id).await?;

        // Lines cascade with the cart
        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;

        if products.is_empty() {
            tx.commit().await?;
            return Ok(None);
        }

        let new_order = snapshot_order(&cart, &products, payment_date);
        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (customer_id, order_date, items, payment_date, cost)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, customer_id, order_date, items, payment_date, cost
            "#,
        )
        .bind(new_order.customer_id)
        .bind(new_order.order_date)
        .bind(Json(&new_order.items))
        .bind(new_order.payment_date)
        .bind(new_order.cost)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(order))
    }

    async fn orders_for(&self, customer_id: i64) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, customer_id, order_date, items, payment_date, cost
            FROM orders
            WHERE customer_id = $1
            ORDER BY order_date DESC, id DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn find_order(&self, id: i64) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, customer_id, order_date, items, payment_date, cost
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    async fn search_orders(&self, search: Option<&str>) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT o.id, o.customer_id, o.order_date, o.items, o.payment_date, o.cost
            FROM orders o
            JOIN users u ON u.id = o.customer_id
            WHERE $1::TEXT IS NULL
               OR o.cost::TEXT = $1
               OR u.email ILIKE '%' || $1 || '%'
               OR u.first_name ILIKE '%' || $1 || '%'
               OR u.last_name ILIKE '%' || $1 || '%'
            ORDER BY o.order_date DESC, o.id DESC
            "#,
        )
        .bind(search)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn dispute_choices(&self) -> Result<Vec<DisputeChoice>> {
        let choices = sqlx::query_as::<_, DisputeChoice>(
            "SELECT id, choice FROM dispute_choices ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(choices)
    }

    async fn create_dispute_choice(&self, choice: &str) -> Result<DisputeChoice> {
        let created = sqlx::query_as::<_, DisputeChoice>(
            "INSERT INTO dispute_choices (choice) VALUES ($1) RETURNING id, choice",
        )
        .bind(choice)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "dispute choice"))?;

        Ok(created)
    }

    async fn create_dispute(&self, order_id: i64, text: &str) -> Result<Dispute> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO disputes (order_id, dispute_text)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "dispute"))?;

        self.find_dispute(id).await?.ok_or(AppError::NotFound)
    }

    async fn find_dispute(&self, id: i64) -> Result<Option<Dispute>> {
        let dispute = sqlx::query_as::<_, Dispute>(&format!("{} WHERE d.id = $1", DISPUTE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(dispute)
    }

    async fn find_dispute_for_order(&self, order_id: i64) -> Result<Option<Dispute>> {
        let dispute =
            sqlx::query_as::<_, Dispute>(&format!("{} WHERE d.order_id = $1", DISPUTE_SELECT))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(dispute)
    }

    async fn disputes_for(&self, customer_id: i64, limit: i64, offset: i64) -> Result<Vec<Dispute>> {
        let disputes = sqlx::query_as::<_, Dispute>(&format!(
            "{} WHERE o.customer_id = $1 ORDER BY d.created_at, d.id LIMIT $2 OFFSET $3",
            DISPUTE_SELECT
        ))
        .bind(customer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(disputes)
    }

    async fn count_disputes_for(&self, customer_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM disputes d
            JOIN orders o ON o.id = d.order_id
            WHERE o.customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn all_disputes(&self, decision_id: Option<i64>) -> Result<Vec<Dispute>> {
        let disputes = match decision_id {
            Some(choice) => {
                sqlx::query_as::<_, Dispute>(&format!(
                    "{} WHERE d.decision_id = $1 ORDER BY d.created_at, d.id",
                    DISPUTE_SELECT
                ))
                .bind(choice)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Dispute>(&format!(
                    "{} ORDER BY d.created_at, d.id",
                    DISPUTE_SELECT
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(disputes)
    }

    async fn update_dispute_decision(
        &self,
        id: i64,
        decision_id: Option<i64>,
        decision_text: Option<String>,
        decision_date: Option<DateTime<Utc>>,
    ) -> Result<Dispute> {
        let result = sqlx::query(
            r#"
            UPDATE disputes
            SET decision_id = $2, decision_text = $3, decision_date = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(decision_id)
        .bind(decision_text)
        .bind(decision_date)
        .execute(&self.pool)
        .await;

        match result {
            Ok(r) if r.rows_affected() == 0 => return Err(AppError::NotFound),
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(AppError::NotFound);
            }
            Err(e) => return Err(e.into()),
        }

        self.find_dispute(id).await?.ok_or(AppError::NotFound)
    }

    async fn create_slot(&self, slot: NewSlot) -> Result<Schedule> {
        let created = sqlx::query_as::<_, Schedule>(
            r#"
            INSERT INTO schedules (date, start_time, end_time)
            VALUES ($1, $2, $3)
            RETURNING id, date, start_time, end_time, assigned_to
            "#,
        )
        .bind(slot.date)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn all_slots(&self) -> Result<Vec<Schedule>> {
        let slots = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, date, start_time, end_time, assigned_to
            FROM schedules
            ORDER BY date DESC, start_time DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    async fn open_slots(&self, today: NaiveDate) -> Result<Vec<Schedule>> {
        let slots = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, date, start_time, end_time, assigned_to
            FROM schedules
            WHERE assigned_to IS NULL AND date >= $1
            ORDER BY date, start_time, id
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    async fn bookings_for(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Schedule>> {
        let slots = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, date, start_time, end_time, assigned_to
            FROM schedules
            WHERE assigned_to = $1 AND date >= $2
            ORDER BY date, start_time, id
            "#,
        )
        .bind(user_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(slots)
    }

    async fn find_open_slot(&self, id: i64, today: NaiveDate) -> Result<Option<Schedule>> {
        let slot = sqlx::query_as::<_, Schedule>(
            r#"
            SELECT id, date, start_time, end_time, assigned_to
            FROM schedules
            WHERE id = $1 AND assigned_to IS NULL AND date >= $2
            "#,
        )
        .bind(id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await?;

        Ok(slot)
    }

    async fn claim_slot(&self, id: i64, user_id: i64, today: NaiveDate) -> Result<Option<Schedule>> {
        let slot = sqlx::query_as::<_, Schedule>(
            r#"
            UPDATE schedules
            SET assigned_to = $2
            WHERE id = $1 AND assigned_to IS NULL AND date >= $3
            RETURNING id, date, start_time, end_time, assigned_to
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await?;

        Ok(slot)
    }
}
