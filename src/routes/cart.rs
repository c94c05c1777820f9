//! Cart and payment route handlers

use askama::Template;
use axum::{
    extract::{Path, State},
    response::{Html, Redirect},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

use crate::auth::CurrentUser;
use crate::error::Result;
use crate::shop::cart::{self, CartAction, CartSummary};
use crate::shop::checkout;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/course/:slug/add/", post(update))
        .route("/cart/", get(view))
        .route("/cart/:slug/update/", post(update))
        .route("/payment/", get(payment).post(pay))
}

/// Cart form body (`submit=add|remove`)
#[derive(Debug, Deserialize)]
pub struct CartForm {
    #[serde(default)]
    pub submit: String,
}

#[derive(Template)]
#[template(path = "cart.html")]
struct CartTemplate {
    summary: CartSummary,
}

#[derive(Template)]
#[template(path = "payment.html")]
struct PaymentTemplate {
    summary: CartSummary,
}

/// Add or remove one course, then show the cart
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Form(form): Form<CartForm>,
) -> Result<Redirect> {
    match CartAction::parse(&form.submit) {
        Some(action) => cart::apply(state.store.as_ref(), &user, &slug, action).await?,
        None => tracing::debug!(submit = %form.submit, "Ignoring unknown cart action"),
    }

    Ok(Redirect::to("/cart/"))
}

pub async fn view(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>> {
    let summary = cart::view_cart(state.store.as_ref(), &user).await?;
    Ok(Html(CartTemplate { summary }.render()?))
}

/// Payment confirmation page
pub async fn payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Html<String>> {
    let summary = cart::view_cart(state.store.as_ref(), &user).await?;
    Ok(Html(PaymentTemplate { summary }.render()?))
}

/// Turn the cart into an order
pub async fn pay(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Redirect> {
    checkout::checkout(state.store.as_ref(), &user).await?;
    Ok(Redirect::to("/orders/"))
}
