//! Cart manager: add, remove and view the per-user cart.

use rust_decimal::Decimal;
use tracing::info;

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{Cart, Product, User};

use super::pricing::cart_total;

/// What the cart form asked for (`submit=add|remove`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartAction {
    Add,
    Remove,
}

impl CartAction {
    pub fn parse(submit: &str) -> Option<Self> {
        match submit {
            "add" => Some(CartAction::Add),
            "remove" => Some(CartAction::Remove),
            _ => None,
        }
    }
}

/// The cart page: contents and total, or the empty state
#[derive(Debug, Clone)]
pub struct CartSummary {
    pub cart: Option<Cart>,
    pub products: Vec<Product>,
    pub total: Decimal,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn contains(&self, product_id: i64) -> bool {
        self.products.iter().any(|p| p.id == product_id)
    }
}

async fn product_by_slug(store: &dyn Store, slug: &str) -> Result<Product> {
    store
        .find_product_by_slug(slug)
        .await?
        .ok_or(AppError::NotFound)
}

/// Put a product in the user's cart, creating the cart on first use.
pub async fn add_to_cart(store: &dyn Store, user: &User, slug: &str) -> Result<Cart> {
    let product = product_by_slug(store, slug).await?;
    let cart = store.add_to_cart(user.id, product.id).await?;
    info!(user_id = user.id, cart_id = cart.id, product = %product.slug, "Added to cart");
    Ok(cart)
}

/// Take a product out of the user's cart; the cart goes away with its last line.
pub async fn remove_from_cart(store: &dyn Store, user: &User, slug: &str) -> Result<Option<Cart>> {
    let product = product_by_slug(store, slug).await?;
    let cart = store.remove_from_cart(user.id, product.id).await?;
    if cart.is_none() {
        info!(user_id = user.id, product = %product.slug, "Cart emptied");
    }
    Ok(cart)
}

/// Apply a cart form submission
pub async fn apply(store: &dyn Store, user: &User, slug: &str, action: CartAction) -> Result<()> {
    match action {
        CartAction::Add => add_to_cart(store, user, slug).await.map(|_| ()),
        CartAction::Remove => remove_from_cart(store, user, slug).await.map(|_| ()),
    }
}

pub async fn view_cart(store: &dyn Store, user: &User) -> Result<CartSummary> {
    let Some(cart) = store.find_cart(user.id).await? else {
        return Ok(CartSummary {
            cart: None,
            products: Vec::new(),
            total: Decimal::ZERO,
        });
    };

    let products = store.cart_products(cart.id).await?;
    let total = cart_total(&products);
    Ok(CartSummary {
        cart: Some(cart),
        products,
        total,
    })
}
