//! In-process store.
//!
//! One mutex guards all tables, so every operation is atomic with respect to
//! the others. Constraint violations surface exactly like the Postgres ones.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    Cart, Dispute, DisputeChoice, NewProduct, NewSlot, NewUser, Order, Product, Schedule, User,
};
use crate::shop::checkout::snapshot_order;

use super::Store;

#[derive(Debug, Clone)]
struct CartLine {
    cart_id: i64,
    product_id: i64,
}

#[derive(Debug, Clone)]
struct DisputeRow {
    id: i64,
    order_id: i64,
    created_at: DateTime<Utc>,
    dispute_text: String,
    decision_id: Option<i64>,
    decision_text: Option<String>,
    decision_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    users: Vec<User>,
    products: Vec<Product>,
    carts: Vec<Cart>,
    cart_lines: Vec<CartLine>,
    orders: Vec<Order>,
    choices: Vec<DisputeChoice>,
    disputes: Vec<DisputeRow>,
    slots: Vec<Schedule>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn cart_of(&self, customer_id: i64) -> Option<&Cart> {
        self.carts.iter().find(|c| c.customer_id == customer_id)
    }

    fn lines_of(&self, cart_id: i64) -> impl Iterator<Item = &CartLine> {
        self.cart_lines.iter().filter(move |l| l.cart_id == cart_id)
    }

    fn products_of(&self, cart_id: i64) -> Vec<Product> {
        self.lines_of(cart_id)
            .filter_map(|l| self.products.iter().find(|p| p.id == l.product_id))
            .cloned()
            .collect()
    }

    fn drop_empty_carts(&mut self) {
        let lines = &self.cart_lines;
        self.carts
            .retain(|c| lines.iter().any(|l| l.cart_id == c.id));
    }

    fn dispute(&self, row: &DisputeRow) -> Option<Dispute> {
        let order = self.orders.iter().find(|o| o.id == row.order_id)?;
        let decision = row
            .decision_id
            .and_then(|id| self.choices.iter().find(|c| c.id == id))
            .map(|c| c.choice.clone());
        Some(Dispute {
            id: row.id,
            order_id: row.order_id,
            customer_id: order.customer_id,
            created_at: row.created_at,
            dispute_text: row.dispute_text.clone(),
            decision_id: row.decision_id,
            decision,
            decision_text: row.decision_text.clone(),
            decision_date: row.decision_date,
        })
    }

    fn disputes_where(&self, keep: impl Fn(&Dispute) -> bool) -> Vec<Dispute> {
        let mut disputes: Vec<Dispute> = self
            .disputes
            .iter()
            .filter_map(|row| self.dispute(row))
            .filter(|d| keep(d))
            .collect();
        disputes.sort_by_key(|d| (d.created_at, d.id));
        disputes
    }

    fn sorted_slots(&self, keep: impl Fn(&Schedule) -> bool) -> Vec<Schedule> {
        let mut slots: Vec<Schedule> = self.slots.iter().filter(|s| keep(s)).cloned().collect();
        slots.sort_by_key(|s| (s.date, s.start_time, s.id));
        slots
    }
}

/// Store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("user already exists".into()));
        }
        let created = User {
            id: t.next_id(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            is_staff: user.is_staff,
            date_joined: Utc::now(),
        };
        t.users.push(created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn set_staff(&self, id: i64, is_staff: bool) -> Result<()> {
        let mut t = self.tables.lock().await;
        let user = t.users.iter_mut().find(|u| u.id == id).ok_or(AppError::NotFound)?;
        user.is_staff = is_staff;
        Ok(())
    }

    async fn products_in_sale(&self, limit: i64, offset: i64) -> Result<Vec<Product>> {
        let t = self.tables.lock().await;
        let in_sale: Vec<Product> = t.products.iter().filter(|p| p.in_sale).cloned().collect();
        Ok(page(in_sale, limit, offset))
    }

    async fn count_products_in_sale(&self) -> Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.products.iter().filter(|p| p.in_sale).count() as i64)
    }

    async fn all_products(&self) -> Result<Vec<Product>> {
        let t = self.tables.lock().await;
        Ok(t.products.clone())
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let t = self.tables.lock().await;
        Ok(t.products.iter().find(|p| p.slug == slug).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let mut t = self.tables.lock().await;
        if t.products.iter().any(|p| p.slug == product.slug) {
            return Err(AppError::Conflict("product already exists".into()));
        }
        let created = Product {
            id: t.next_id(),
            name: product.name,
            slug: product.slug,
            description: product.description,
            price: product.price,
            in_sale: product.in_sale,
            image: None,
        };
        t.products.push(created.clone());
        Ok(created)
    }

    async fn set_product_price(&self, id: i64, price: Decimal) -> Result<()> {
        let mut t = self.tables.lock().await;
        let product = t.products.iter_mut().find(|p| p.id == id).ok_or(AppError::NotFound)?;
        product.price = price;
        Ok(())
    }

    async fn set_in_sale(&self, ids: &[i64], in_sale: bool) -> Result<u64> {
        let mut t = self.tables.lock().await;
        let mut updated = 0;
        for product in t.products.iter_mut().filter(|p| ids.contains(&p.id)) {
            product.in_sale = in_sale;
            updated += 1;
        }
        Ok(updated)
    }

    async fn set_product_image(&self, id: i64, image: &str) -> Result<()> {
        let mut t = self.tables.lock().await;
        let product = t.products.iter_mut().find(|p| p.id == id).ok_or(AppError::NotFound)?;
        product.image = Some(image.to_string());
        Ok(())
    }

    async fn delete_product(&self, id: i64) -> Result<()> {
        let mut t = self.tables.lock().await;
        t.products.retain(|p| p.id != id);
        t.cart_lines.retain(|l| l.product_id != id);
        t.drop_empty_carts();
        Ok(())
    }

    async fn find_cart(&self, customer_id: i64) -> Result<Option<Cart>> {
        let t = self.tables.lock().await;
        Ok(t.cart_of(customer_id).cloned())
    }

    async fn all_carts(&self) -> Result<Vec<Cart>> {
        let t = self.tables.lock().await;
        let mut carts = t.carts.clone();
        carts.sort_by(|a, b| (b.start_date, b.id).cmp(&(a.start_date, a.id)));
        Ok(carts)
    }

    async fn cart_products(&self, cart_id: i64) -> Result<Vec<Product>> {
        let t = self.tables.lock().await;
        Ok(t.products_of(cart_id))
    }

    async fn add_to_cart(&self, customer_id: i64, product_id: i64) -> Result<Cart> {
        let mut t = self.tables.lock().await;
        if !t.products.iter().any(|p| p.id == product_id) {
            return Err(AppError::NotFound);
        }

        let cart = match t.cart_of(customer_id).cloned() {
            Some(cart) => cart,
            None => {
                let cart = Cart {
                    id: t.next_id(),
                    customer_id,
                    start_date: Utc::now(),
                };
                t.carts.push(cart.clone());
                cart
            }
        };

        if !t.lines_of(cart.id).any(|l| l.product_id == product_id) {
            t.cart_lines.push(CartLine {
                cart_id: cart.id,
                product_id,
            });
        }
        Ok(cart)
    }

    async fn remove_from_cart(&self, customer_id: i64, product_id: i64) -> Result<Option<Cart>> {
        let mut t = self.tables.lock().await;
        let Some(cart) = t.cart_of(customer_id).cloned() else {
            return Ok(None);
        };
        t.cart_lines
            .retain(|l| !(l.cart_id == cart.id && l.product_id == product_id));
        t.drop_empty_carts();
        Ok(t.cart_of(customer_id).cloned())
    }

    async fn checkout(&self, customer_id: i64, payment_date: DateTime<Utc>) -> Result<Option<Order>> {
        let mut t = self.tables.lock().await;
        let Some(cart) = t.cart_of(customer_id).cloned() else {
            return Ok(None);
        };
        let products = t.products_of(cart.id);

        t.cart_lines.retain(|l| l.cart_id != cart.id);
        t.carts.retain(|c| c.id != cart.id);
        if products.is_empty() {
            return Ok(None);
        }

        let id = t.next_id();
        let order = snapshot_order(&cart, &products, payment_date).into_order(id);
        t.orders.push(order.clone());
        Ok(Some(order))
    }

    async fn orders_for(&self, customer_id: i64) -> Result<Vec<Order>> {
        let t = self.tables.lock().await;
        let mut orders: Vec<Order> = t
            .orders
            .iter()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.order_date, b.id).cmp(&(a.order_date, a.id)));
        Ok(orders)
    }

    async fn find_order(&self, id: i64) -> Result<Option<Order>> {
        let t = self.tables.lock().await;
        Ok(t.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn search_orders(&self, search: Option<&str>) -> Result<Vec<Order>> {
        let t = self.tables.lock().await;
        let needle = search.map(str::to_lowercase);
        let matches = |order: &Order| {
            let Some(needle) = needle.as_deref() else {
                return true;
            };
            if order.cost.to_string() == needle {
                return true;
            }
            t.users.iter().any(|u| {
                u.id == order.customer_id
                    && [&u.email, &u.first_name, &u.last_name]
                        .iter()
                        .any(|field| field.to_lowercase().contains(needle))
            })
        };
        let mut orders: Vec<Order> = t.orders.iter().filter(|o| matches(o)).cloned().collect();
        orders.sort_by(|a, b| (b.order_date, b.id).cmp(&(a.order_date, a.id)));
        Ok(orders)
    }

    async fn dispute_choices(&self) -> Result<Vec<DisputeChoice>> {
        let t = self.tables.lock().await;
        Ok(t.choices.clone())
    }

    async fn create_dispute_choice(&self, choice: &str) -> Result<DisputeChoice> {
        let mut t = self.tables.lock().await;
        if t.choices.iter().any(|c| c.choice == choice) {
            return Err(AppError::Conflict("dispute choice already exists".into()));
        }
        let created = DisputeChoice {
            id: t.next_id(),
            choice: choice.to_string(),
        };
        t.choices.push(created.clone());
        Ok(created)
    }

    async fn create_dispute(&self, order_id: i64, text: &str) -> Result<Dispute> {
        let mut t = self.tables.lock().await;
        if !t.orders.iter().any(|o| o.id == order_id) {
            return Err(AppError::NotFound);
        }
        if t.disputes.iter().any(|d| d.order_id == order_id) {
            return Err(AppError::Conflict("dispute already exists".into()));
        }
        let row = DisputeRow {
            id: t.next_id(),
            order_id,
            created_at: Utc::now(),
            dispute_text: text.to_string(),
            decision_id: None,
            decision_text: None,
            decision_date: None,
        };
        t.disputes.push(row.clone());
        t.dispute(&row).ok_or(AppError::NotFound)
    }

    async fn find_dispute(&self, id: i64) -> Result<Option<Dispute>> {
        let t = self.tables.lock().await;
        Ok(t.disputes.iter().find(|d| d.id == id).and_then(|row| t.dispute(row)))
    }

    async fn find_dispute_for_order(&self, order_id: i64) -> Result<Option<Dispute>> {
        let t = self.tables.lock().await;
        Ok(t
            .disputes
            .iter()
            .find(|d| d.order_id == order_id)
            .and_then(|row| t.dispute(row)))
    }

    async fn disputes_for(&self, customer_id: i64, limit: i64, offset: i64) -> Result<Vec<Dispute>> {
        let t = self.tables.lock().await;
        Ok(page(t.disputes_where(|d| d.customer_id == customer_id), limit, offset))
    }

    async fn count_disputes_for(&self, customer_id: i64) -> Result<i64> {
        let t = self.tables.lock().await;
        Ok(t.disputes_where(|d| d.customer_id == customer_id).len() as i64)
    }

    async fn all_disputes(&self, decision_id: Option<i64>) -> Result<Vec<Dispute>> {
        let t = self.tables.lock().await;
        Ok(t.disputes_where(|d| decision_id.is_none() || d.decision_id == decision_id))
    }

    async fn update_dispute_decision(
        &self,
        id: i64,
        decision_id: Option<i64>,
        decision_text: Option<String>,
        decision_date: Option<DateTime<Utc>>,
    ) -> Result<Dispute> {
        let mut t = self.tables.lock().await;
        if let Some(choice_id) = decision_id {
            if !t.choices.iter().any(|c| c.id == choice_id) {
                return Err(AppError::NotFound);
            }
        }
        let row = t.disputes.iter_mut().find(|d| d.id == id).ok_or(AppError::NotFound)?;
        row.decision_id = decision_id;
        row.decision_text = decision_text;
        row.decision_date = decision_date;
        let row = row.clone();
        t.dispute(&row).ok_or(AppError::NotFound)
    }

    async fn create_slot(&self, slot: NewSlot) -> Result<Schedule> {
        let mut t = self.tables.lock().await;
        let created = Schedule {
            id: t.next_id(),
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            assigned_to: None,
        };
        t.slots.push(created.clone());
        Ok(created)
    }

    async fn all_slots(&self) -> Result<Vec<Schedule>> {
        let t = self.tables.lock().await;
        let mut slots = t.sorted_slots(|_| true);
        slots.reverse();
        Ok(slots)
    }

    async fn open_slots(&self, today: NaiveDate) -> Result<Vec<Schedule>> {
        let t = self.tables.lock().await;
        Ok(t.sorted_slots(|s| s.is_open(today)))
    }

    async fn bookings_for(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Schedule>> {
        let t = self.tables.lock().await;
        Ok(t.sorted_slots(|s| s.assigned_to == Some(user_id) && s.date >= today))
    }

    async fn find_open_slot(&self, id: i64, today: NaiveDate) -> Result<Option<Schedule>> {
        let t = self.tables.lock().await;
        Ok(t.slots.iter().find(|s| s.id == id && s.is_open(today)).cloned())
    }

    async fn claim_slot(&self, id: i64, user_id: i64, today: NaiveDate) -> Result<Option<Schedule>> {
        let mut t = self.tables.lock().await;
        let Some(slot) = t.slots.iter_mut().find(|s| s.id == id && s.is_open(today)) else {
            return Ok(None);
        };
        slot.assigned_to = Some(user_id);
        Ok(Some(slot.clone()))
    }
}
